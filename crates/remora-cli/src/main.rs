//! remora-cli - bank デモのバインディングを Loopback サーバに向けて動かす
//!
//! 実際のネットワークは使いません。LoopbackTransport のハンドラが
//! サーバ役になり、各シナリオの結果を標準出力に書きます。

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::rc::Rc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use remora_core::impls::{LoopbackTransport, Reply};
use remora_core::protocol::REFERENCE_CLASS;
use remora_core::{Client, ClientConfig, FormCallbacks, Outcome, Value};
use serde_json::json;
use tracing::info;

const BANK_BINDINGS: &str = include_str!("../fixtures/bank.json");
const BRANCH: &str = "com.example.bank.Branch";

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum Scenario {
    Lazy,
    Form,
    Validation,
    Revival,
    All,
}

#[derive(Parser, Debug)]
#[command(name = "remora")]
#[command(about = "Drive remote invocations against an in-process loopback server", long_about = None)]
struct Args {
    /// ClientConfig の JSON ファイル
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 型バインディング（省略時は同梱の bank.json）
    #[arg(short, long)]
    bindings: Option<PathBuf>,

    #[arg(short, long, value_enum, default_value_t = Scenario::All)]
    scenario: Scenario,

    /// RUST_LOG が無いときのフィルタ
    #[arg(long, default_value = "info")]
    log_level: String,
}

/// bank サーバの代役
fn bank_server() -> LoopbackTransport {
    LoopbackTransport::new()
        .on("com.example.bank.Branch.getAccounts", |call| {
            info!(target_present = call.target.is_some(), "server: getAccounts");
            Reply::Result(json!([
                {"@class": "com.example.bank.Account", "id": 10, "number": "A-10", "balance": 120.5,
                 "opened": "2011-03-01T09:30:00.000+0000",
                 "branch": {"@class": REFERENCE_CLASS, "stub": {"@class": BRANCH, "id": 1}}},
                {"@class": "com.example.bank.Account", "id": 11, "number": "A-11", "balance": 0,
                 "opened": "2012-07-15T00:00:00.000+0000",
                 "branch": {"@class": REFERENCE_CLASS, "stub": {"@class": BRANCH, "id": 1}}}
            ]))
        })
        .on("com.example.bank.Branch.openAccount", |call| {
            let number = call.arguments.first().cloned().unwrap_or_default();
            Reply::Result(json!({"@class": "com.example.bank.Account", "id": 12, "number": number, "balance": 0}))
        })
        .on("com.example.bank.Company.findAll", |_| {
            Reply::Result(json!([
                {"@class": BRANCH, "id": 1, "name": "Main",
                 "company": {"@class": "com.example.bank.Company", "id": 5, "name": "Acme"}},
                {"@class": BRANCH, "id": 2, "name": "Harbor",
                 "company": {"@class": "com.example.bank.Company", "id": 5, "name": "Acme"}}
            ]))
        })
}

fn main_branch(client: &Client) -> remora_core::RemoteObject {
    client.instantiate(BRANCH, BTreeMap::from([("id".to_string(), Value::from(1))]))
}

async fn run_lazy(client: &Client, server: &LoopbackTransport) {
    let branch = main_branch(client);
    for round in 1..=2 {
        match client.remote(&branch, "getAccounts", vec![]).outcome().await {
            Outcome::Success(accounts) => {
                let count = accounts.as_list().map_or(0, |l| l.len());
                println!("[lazy] round {round}: {count} accounts, transport calls so far: {}", server.call_count());
            }
            other => println!("[lazy] round {round}: {other:?}"),
        }
    }
    if let Some(first) = branch.get("accounts").as_list().and_then(|l| l.first().cloned()) {
        println!("[lazy] first account opened at {}", first.get("opened"));
    }
}

fn run_form(client: &Client) -> Result<()> {
    let form = client.method(&main_branch(client), "openAccount").form(BTreeMap::new())?;
    form.set_data("number", "A-20001");
    form.set_data("initialDeposit", "250.00");
    form.submit(
        FormCallbacks::new()
            .on_success(|account| println!("[form] opened account {}", account.get("number")))
            .on_exception(|e| println!("[form] rejected: {e}")),
    );
    println!("[form] state after submit: {:?}", form.state());
    if form.submit(FormCallbacks::new()).is_none() {
        println!("[form] second submit ignored");
    }
    Ok(())
}

async fn run_validation(client: &Client) {
    let outcome = client
        .remote(&main_branch(client), "openAccount", vec![Value::from("abc"), Value::from("10")])
        .outcome()
        .await;
    match outcome {
        Outcome::Exception(e) if e.is_validation() => {
            for error in e.validation_errors() {
                println!(
                    "[validation] {}: {} ({})",
                    error.field_name,
                    error.message.as_deref().unwrap_or("invalid"),
                    error.error_code.as_deref().unwrap_or("-")
                );
            }
        }
        other => println!("[validation] unexpected outcome: {other:?}"),
    }
}

async fn run_revival(client: &Client) {
    let outcome = client
        .invoke_static("com.example.bank.Company", "findAll", vec![])
        .outcome()
        .await;
    let Outcome::Success(branches) = outcome else {
        println!("[revival] unexpected outcome: {outcome:?}");
        return;
    };
    let companies: Vec<_> = branches
        .as_list()
        .map(|l| l.iter().filter_map(|b| b.get("company").resolve_object()).collect())
        .unwrap_or_default();
    let shared = companies.windows(2).all(|w| w[0].ptr_eq(&w[1]));
    println!("[revival] {} branches share one company instance: {shared}", companies.len());
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&args.log_level)),
        )
        .init();

    let config = match &args.config {
        Some(path) => ClientConfig::load(path).with_context(|| format!("loading config {}", path.display()))?,
        None => ClientConfig::new("/mwanzia", "bank"),
    };
    let bindings = match &args.bindings {
        Some(path) => std::fs::read_to_string(path).with_context(|| format!("reading bindings {}", path.display()))?,
        None => BANK_BINDINGS.to_string(),
    };

    let server = Rc::new(bank_server());
    let client = Client::builder()
        .config(config)
        .bindings(&bindings)
        .context("loading bindings")?
        .expect_types(&[BRANCH, "com.example.bank.Company"])
        .transport(server.clone())
        .default_exception_handler(|e| eprintln!("unhandled exception: {e}"))
        .default_error_handler(|e| eprintln!("transport error: {e}"))
        .build()?;
    info!(?client, scenario = ?args.scenario, "client ready");

    let wants = |s: Scenario| args.scenario == s || args.scenario == Scenario::All;
    if wants(Scenario::Lazy) {
        run_lazy(&client, &server).await;
    }
    if wants(Scenario::Form) {
        run_form(&client)?;
    }
    if wants(Scenario::Validation) {
        run_validation(&client).await;
    }
    if wants(Scenario::Revival) {
        run_revival(&client).await;
    }
    info!(calls = server.call_count(), "done");
    Ok(())
}
