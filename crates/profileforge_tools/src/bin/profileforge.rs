#![forbid(unsafe_code)]

use std::env;
use std::io::{self, BufRead, IsTerminal, Write};

use profileforge_engines::session_marker::FileSessionMarker;
use profileforge_os::auth::{AuthRuntime, AuthRuntimeConfig};
use profileforge_storage::store::ProfileForgeStore;
use profileforge_tools::shell::{
    execute_shell_command, SecretEntry, SecretPrompt, ShellCommand,
};

fn main() {
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(2);
    }
}

fn run() -> Result<(), String> {
    let interactive = io::stdin().is_terminal();
    let mut runtime = AuthRuntime::start(
        ProfileForgeStore::new_in_memory(),
        FileSessionMarker::default_local(),
        AuthRuntimeConfig::from_env_var_map(|key| env::var(key).ok()),
    );
    if interactive {
        println!("profileforge shell. type `help` for commands.");
        if let Some(profile) = runtime.current_profile() {
            println!("signed in as {}", profile.email);
        }
    }

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        if interactive {
            print!("profileforge> ");
            io::stdout().flush().map_err(|e| e.to_string())?;
        }
        let Some(line) = lines.next() else {
            break;
        };
        let line = line.map_err(|e| e.to_string())?;
        let command = match ShellCommand::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(err) => {
                eprintln!("{err}");
                continue;
            }
        };
        if command == ShellCommand::Quit {
            break;
        }
        let secret = match command.needs_secret() {
            Some(prompt) => Some(read_secret_entry(prompt, interactive, &mut lines)?),
            None => None,
        };
        match execute_shell_command(&mut runtime, &command, secret.as_ref()) {
            Ok(output) if !output.is_empty() => println!("{output}"),
            Ok(_) => {}
            Err(err) => eprintln!("{err}"),
        }
    }
    Ok(())
}

fn read_secret_entry<I>(
    prompt: SecretPrompt,
    interactive: bool,
    lines: &mut I,
) -> Result<SecretEntry, String>
where
    I: Iterator<Item = io::Result<String>>,
{
    let secret = read_secret("Password: ", interactive, lines)?;
    let confirm = match prompt {
        SecretPrompt::NewSecret => Some(read_secret("Confirm password: ", interactive, lines)?),
        SecretPrompt::Existing => None,
    };
    Ok(SecretEntry { secret, confirm })
}

fn read_secret<I>(prompt: &str, interactive: bool, lines: &mut I) -> Result<String, String>
where
    I: Iterator<Item = io::Result<String>>,
{
    let value = if interactive {
        rpassword::prompt_password(prompt).map_err(|e| e.to_string())?
    } else {
        lines
            .next()
            .ok_or_else(|| "missing secret input".to_string())?
            .map_err(|e| e.to_string())?
    };
    let value = value.trim_end_matches(['\r', '\n']).to_string();
    if value.is_empty() {
        return Err("secret value must not be empty".to_string());
    }
    Ok(value)
}
