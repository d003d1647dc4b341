use anyhow::{Result, anyhow};
use pico_args::Arguments;
use std::{env, process::Command};

use crate::ipc;

pub fn run() -> Result<()> {
    let mut pargs = Arguments::from_env();

    // Hidden daemon mode (spawned by `start`)
    if pargs.contains("--daemon") {
        return ipc::run_daemon();
    }

    // No args -> general help
    if env::args().len() == 1 {
        print_help();
        return Ok(());
    }

    // Flags-based help (-h/--help)
    if pargs.contains("-h") || pargs.contains("--help") {
        print_help();
        return Ok(());
    }

    // First free arg is the subcommand
    let subcmd: Option<String> = pargs.free_from_str().ok();

    match subcmd.as_deref() {
        Some("help") => {
            let topic: Option<String> = pargs.free_from_str().ok();
            if let Some(t) = topic {
                print_subcmd_help(&t);
            } else {
                print_help();
            }
            Ok(())
        }

        Some("start") => {
            let exe = std::env::current_exe()?;
            let child = Command::new(exe).arg("--daemon").spawn()?;
            println!("padctl: started daemon (pid={})", child.id());
            Ok(())
        }

        Some("stop") => {
            let r = ipc::client_request(serde_json::json!({"op":"shutdown"}))?;
            print_response(&r);
            Ok(())
        }

        Some("status") => {
            let r = ipc::client_request(serde_json::json!({"op":"status"}))?;
            print_response(&r);
            Ok(())
        }

        Some("state") => {
            let r = ipc::client_request(serde_json::json!({"op":"state"}))?;
            print_response(&r);
            Ok(())
        }

        Some("reload") => {
            let r = ipc::client_request(serde_json::json!({"op":"reload"}))?;
            print_response(&r);
            Ok(())
        }

        Some("use") => {
            let name: String = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: padctl use <profile_name>"))?;
            let r = ipc::client_request(serde_json::json!({"op":"use","profile":name}))?;
            print_response(&r);
            Ok(())
        }

        Some("list") => {
            let r = ipc::client_request(serde_json::json!({"op":"list"}))?;
            print_response(&r);
            Ok(())
        }

        Some("set") => {
            // usage: padctl set <key> <value>
            let key: String = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: padctl set <key> <value>"))?;
            let raw: String = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: padctl set <key> <value>"))?;
            let value = parse_set_value(&raw)?;
            let mut params = serde_json::Map::new();
            params.insert(key, value);
            let r = ipc::client_request(serde_json::json!({
                "op": "set",
                "params": params
            }))?;
            print_response(&r);
            Ok(())
        }

        Some("reset") => {
            let r = ipc::client_request(serde_json::json!({"op":"reset"}))?;
            print_response(&r);
            Ok(())
        }

        Some("doctor") => {
            let r = ipc::client_request(serde_json::json!({"op":"doctor"}))?;
            print_response(&r);
            Ok(())
        }

        Some(other) => {
            eprintln!("unknown subcommand: {other}\n");
            print_help();
            Ok(())
        }

        None => {
            print_help();
            Ok(())
        }
    }
}

fn print_help() {
    println!(
        r#"padctl — pressure-pad control pipeline daemon

USAGE:
  padctl help [command]       Show general or command-specific help
  padctl start                Start the daemon
  padctl stop                 Stop the daemon
  padctl status               Show daemon state
  padctl state                Dump the latest frame report (JSON)
  padctl reload               Reload active profile
  padctl use <name>           Switch active profile
  padctl list                 List profiles
  padctl set <key> <value>    Override one pipeline parameter
  padctl reset                Reset the engine (box back to center)
  padctl doctor               Show config paths and rates

TIPS:
  - Profiles: ~/.config/padctl/profiles
  - Active profile pointer: ~/.config/padctl/active
  - Known `set` keys: pressure_threshold, contact_area_threshold,
    sliding_threshold, tangential_threshold, gradient_threshold,
    enable_idle_detection, idle_stability_frames, joystick_threshold,
    touchpad_threshold, joystick_sensitivity, joystick_max_speed,
    joystick_smoothing, touchpad_sensitivity, touchpad_damping,
    touchpad_max_range, movement_factor
"#
    );
}

fn print_subcmd_help(cmd: &str) {
    match cmd {
        "start" => println!("usage: padctl start\nStarts the background daemon."),
        "stop" => println!("usage: padctl stop\nStops the running daemon."),
        "status" => println!(
            "usage: padctl status\nShows active profile, socket, performance mode, control mode."
        ),
        "state" => println!(
            "usage: padctl state\nDumps the latest frame report: contact/sliding flags, COP,\ncontrol mode, box target/actual positions, optional idle breakdown."
        ),
        "reload" => println!(
            "usage: padctl reload\nReloads the current profile; keeps last good on error."
        ),
        "use" => {
            println!("usage: padctl use <name>\nSwitches active profile to <name> and reloads.")
        }
        "list" => {
            println!("usage: padctl list\nLists available profiles.")
        }
        "set" => println!(
            "usage: padctl set <key> <value>\nApplies one parameter override to the running pipeline.\nUnknown keys are ignored."
        ),
        "reset" => println!("usage: padctl reset\nResets the engine state and box position."),
        "doctor" => println!("usage: padctl doctor\nShows config paths, profiles and rates."),
        _ => {
            eprintln!("unknown command: {cmd}\n");
            print_help();
        }
    }
}

fn print_response(v: &serde_json::Value) {
    println!("{}", serde_json::to_string_pretty(v).unwrap_or_default());
}

/// `set` values are numeric, with `true`/`false` accepted for the toggles.
fn parse_set_value(raw: &str) -> Result<serde_json::Value> {
    match raw {
        "true" => Ok(serde_json::Value::Bool(true)),
        "false" => Ok(serde_json::Value::Bool(false)),
        _ => raw
            .parse::<f64>()
            .map(serde_json::Value::from)
            .map_err(|_| anyhow!("value must be a number or true/false, got '{raw}'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_values_accept_numbers_and_booleans() {
        assert_eq!(parse_set_value("0.05").unwrap(), serde_json::json!(0.05));
        assert_eq!(parse_set_value("3").unwrap(), serde_json::json!(3.0));
        assert_eq!(parse_set_value("true").unwrap(), serde_json::json!(true));
        assert_eq!(parse_set_value("false").unwrap(), serde_json::json!(false));
        assert!(parse_set_value("maybe").is_err());
    }
}
