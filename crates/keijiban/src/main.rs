use anyhow::Result;
use keijiban::command_processor::CommandProcessor;
use keijiban::{Config, Session, SessionOptions, Store};
use log::LevelFilter;
use std::env;
use std::io::{self, BufRead, Write};

/// Asks on stderr and reads a y/N answer from stdin.
fn ask(message: &str) -> bool {
    eprint!("{} (y/N): ", message);
    let _ = io::stderr().flush();
    let mut answer = String::new();
    if io::stdin().lock().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim(), "y" | "Y" | "yes" | "はい")
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logger with debug fallback for development
    let mut logger = env_logger::Builder::from_default_env();
    if std::env::var_os("RUST_LOG").is_none() {
        logger.filter_level(LevelFilter::Info);
        logger.filter_module("keijiban", LevelFilter::Debug);
    }
    logger.init();

    let config = match Config::load().await {
        Ok(config) => config,
        Err(e) => {
            eprintln!("設定の読み込みに失敗しました: {}", e);
            eprintln!("提案: 既定の設定で続行します");
            Config::default()
        }
    };

    let store = match Store::new() {
        Ok(store) => store,
        Err(e) => {
            eprintln!("データディレクトリを特定できません: {}", e);
            eprintln!("提案: KEIJIBAN_DATA_DIR を設定してください");
            return Err(e);
        }
    };

    let mut session = Session::open(store, SessionOptions::from_config(&config)).await;
    log::info!("Session opened");

    let args: Vec<String> = env::args().skip(1).collect();
    let mut confirm = ask;
    match CommandProcessor::new()
        .execute(&args, &mut session, &mut confirm)
        .await
    {
        Ok(output) => {
            if !output.is_empty() {
                println!("{}", output);
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("エラー: {}", e);
            if let Some(source) = e.source() {
                eprintln!("詳細: {}", source);
            }
            Err(e)
        }
    }
}
