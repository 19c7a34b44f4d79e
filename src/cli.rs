use anyhow::{Result, anyhow};
use pico_args::Arguments;
use std::{env, path::PathBuf};

use crate::actions::{ScrollAxis, UinputSink};
use crate::config::ProfileStore;
use crate::pipeline::{self, ProfileSource, RunOptions};

pub fn run() -> Result<()> {
    let mut pargs = Arguments::from_env();

    // No args -> general help
    if env::args().len() == 1 {
        print_help();
        return Ok(());
    }

    // Flags-based help (-h/--help)
    if pargs.contains(["-h", "--help"]) {
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

        Some("run") => {
            let opts = parse_run_args(&mut pargs)?;
            reject_leftovers(pargs)?;
            pipeline::run(opts)
        }

        Some("use") => {
            let name: String = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: gesturectl use <profile_name>"))?;
            let mut store = ProfileStore::load_or_install_default()?;
            store.set_active(&name)?;
            print_response(&serde_json::json!({"ok": true, "data": {"active_profile": store.active_name}}));
            Ok(())
        }

        Some("list") => {
            let store = ProfileStore::load_or_install_default()?;
            print_response(&serde_json::json!({
                "ok": true,
                "data": {"profiles": store.list_profiles(), "active": store.active_name}
            }));
            Ok(())
        }

        Some("doctor") => {
            let store = ProfileStore::load_or_install_default()?;
            print_response(&serde_json::json!({"ok": true, "data": store.doctor_report()}));
            Ok(())
        }

        Some("emit") => {
            // usage:
            //   gesturectl emit click right
            //   gesturectl emit scroll 3 [horizontal]
            //   gesturectl emit key CTRL+TAB
            let what: String = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: gesturectl emit <click|scroll|key> ..."))?;
            let mut sink = UinputSink::new()?;
            match what.as_str() {
                "click" => {
                    let btn: String = pargs
                        .free_from_str()
                        .map_err(|_| anyhow!("usage: gesturectl emit click <left|right|middle>"))?;
                    sink.click_mouse(&btn)?;
                    println!("ok: clicked {btn}");
                }
                "scroll" => {
                    let steps: i32 = pargs
                        .free_from_str()
                        .map_err(|_| anyhow!("usage: gesturectl emit scroll <steps> [vertical|horizontal]"))?;
                    let axis = match pargs.opt_free_from_str::<String>()? {
                        Some(a) => ScrollAxis::parse(&a)?,
                        None => ScrollAxis::Vertical,
                    };
                    sink.scroll(axis, steps)?;
                    println!("ok: scrolled {axis:?} {steps}");
                }
                "key" => {
                    let chord: String = pargs
                        .free_from_str()
                        .map_err(|_| anyhow!("usage: gesturectl emit key CTRL+TAB"))?;
                    sink.key_chord(&chord)?;
                    println!("ok: sent key chord {chord}");
                }
                other => return Err(anyhow!("unknown emit kind: {other}")),
            }
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

fn parse_run_args(pargs: &mut Arguments) -> Result<RunOptions> {
    let dry_run = pargs.contains("--dry-run");
    let named: Option<String> = pargs.opt_value_from_str("--profile")?;
    let file: Option<PathBuf> = pargs.opt_value_from_str("--config")?;
    let input: Option<PathBuf> = pargs.opt_value_from_str("--input")?;

    let profile = match (named, file) {
        (Some(_), Some(_)) => return Err(anyhow!("--profile and --config are mutually exclusive")),
        (Some(n), None) => ProfileSource::Named(n),
        (None, Some(p)) => ProfileSource::File(p),
        (None, None) => ProfileSource::Active,
    };

    Ok(RunOptions {
        profile,
        input,
        dry_run,
    })
}

fn reject_leftovers(pargs: Arguments) -> Result<()> {
    let rest = pargs.finish();
    if !rest.is_empty() {
        return Err(anyhow!("unexpected arguments: {rest:?}"));
    }
    Ok(())
}

fn print_help() {
    println!(
        r#"gesturectl — fingertip gesture recognizer

USAGE:
  gesturectl help [command]                   Show general or command-specific help
  gesturectl run [options]                    Recognize gestures from per-frame samples
  gesturectl use <name>                       Switch active profile
  gesturectl list                             List profiles
  gesturectl doctor                           Diagnose permissions and configuration
  gesturectl emit click <left|right|middle>   Emit a mouse click
  gesturectl emit scroll <steps> [axis]       Emit a scroll (+/- steps)
  gesturectl emit key CTRL+TAB                Emit a key or chord

RUN OPTIONS:
  --profile <name>    Use a named profile instead of the active one
  --config <path>     Load a profile from an explicit file
  --input <path>      Read samples from a file instead of stdin
  --dry-run           Print gestures only; do not create a virtual device

INPUT:
  One frame per line: [x, y], {{"x": x, "y": y}} or null (no detection).

TIPS:
  - Profiles: ~/.config/gesturectl/profiles
  - Active profile pointer: ~/.config/gesturectl/active
  - RUST_LOG=debug shows every recognized gesture with its cooldown
"#
    );
}

fn print_subcmd_help(cmd: &str) {
    match cmd {
        "run" => println!(
            "usage: gesturectl run [--profile <name> | --config <path>] [--input <path>] [--dry-run]\nReads one sample per line and prints recognized gestures as JSON lines.\nThe profile file is watched and reloaded on change."
        ),
        "use" => {
            println!("usage: gesturectl use <name>\nValidates <name> and makes it the active profile.")
        }
        "list" => {
            println!("usage: gesturectl list\nLists available profiles and the active one.")
        }
        "doctor" => println!(
            "usage: gesturectl doctor\nChecks uinput access and reports the active configuration."
        ),
        "emit" => println!(
            "usage:\n  gesturectl emit click <left|right|middle>\n  gesturectl emit scroll <steps> [vertical|horizontal]\n  gesturectl emit key CTRL+TAB"
        ),
        _ => {
            eprintln!("unknown command: {cmd}\n");
            print_help();
        }
    }
}

fn print_response(v: &serde_json::Value) {
    println!("{}", serde_json::to_string_pretty(v).unwrap_or_default());
}
