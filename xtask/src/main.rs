#![allow(clippy::cargo_common_metadata)]

use std::process;
use std::thread;
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::Result;
use xshell::{cmd, Shell};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    Fmt,
    Check,
    Clippy,
    /// Run the document store server.
    Run,
    Test,
    Doc,
    PreCommit,
    /// Start a server and place one call between a demo phone and a demo dispatcher.
    Demo,
}

const SERVER_ADDRESS: &str = "127.0.0.1:9001";

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    let sh = Shell::new()?;
    sh.change_dir(project_root::get_project_root()?);

    match &cli.command {
        Command::Fmt => fmt(&sh)?,
        Command::Check => check(&sh)?,
        Command::Clippy => clippy(&sh)?,
        Command::Run => run(&sh)?,
        Command::Test => test(&sh)?,
        Command::Doc => doc(&sh)?,
        Command::PreCommit => pre_commit(&sh)?,
        Command::Demo => demo(&sh)?,
    };

    Ok(())
}

fn fmt(sh: &Shell) -> Result<()> {
    Ok(cmd!(sh, "cargo +nightly fmt").run()?)
}

fn check(sh: &Shell) -> Result<()> {
    Ok(cmd!(sh, "cargo check --all-targets --all-features --workspace").run()?)
}

fn clippy(sh: &Shell) -> Result<()> {
    Ok(cmd!(sh, "cargo clippy --all-targets --all-features --workspace").run()?)
}

fn run(sh: &Shell) -> Result<()> {
    Ok(cmd!(sh, "cargo run --package call-signal-server -- {SERVER_ADDRESS}").run()?)
}

fn test(sh: &Shell) -> Result<()> {
    Ok(cmd!(sh, "cargo test --all-features --workspace").run()?)
}

fn doc(sh: &Shell) -> Result<()> {
    Ok(cmd!(sh, "cargo doc --no-deps --all-features").run()?)
}

fn pre_commit(sh: &Shell) -> Result<()> {
    for cmd in [fmt, check, clippy, test, doc] {
        cmd(sh)?;
    }
    Ok(())
}

fn demo(sh: &Shell) -> Result<()> {
    cmd!(sh, "cargo build --package call-signal-server --package call-demo").run()?;
    let root = project_root::get_project_root()?;
    let mut server = process::Command::new("./target/debug/call-signal-server")
        .arg(SERVER_ADDRESS)
        .current_dir(&root)
        .spawn()?;
    thread::sleep(Duration::from_millis(500));

    let server_url = format!("ws://{SERVER_ADDRESS}/store");
    let result = || -> Result<()> {
        let mut phone = process::Command::new("./target/debug/call-demo")
            .args(["--server", &server_url, "phone", "--hang-up-after", "3"])
            .current_dir(&root)
            .stdout(process::Stdio::piped())
            .spawn()?;
        let call_id = {
            use std::io::BufRead;
            let stdout = phone
                .stdout
                .take()
                .ok_or_else(|| color_eyre::eyre::eyre!("phone stdout not captured"))?;
            let mut line = String::new();
            std::io::BufReader::new(stdout).read_line(&mut line)?;
            line.trim().to_owned()
        };
        cmd!(sh, "./target/debug/call-demo --server {server_url} dispatcher {call_id}").run()?;
        phone.wait()?;
        Ok(())
    }();

    server.kill()?;

    result
}
