use anyhow::{Context, Result, anyhow};
use pico_args::Arguments;
use serde_json::{Value, json};
use std::{
    env, fs,
    io::{BufRead, BufReader},
    process::Command,
};

use crate::config::DaemonConfigState;
use crate::exercises;
use crate::gestures::Exercise;
use crate::ipc;
use crate::landmarks::Frame;
use crate::session::Session;

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

    if pargs.contains("-h") || pargs.contains("--help") {
        print_help();
        return Ok(());
    }

    // options are pulled before positionals so they may appear anywhere
    let session: Option<String> = pargs.opt_value_from_str("--session")?;
    let fps: Option<u32> = pargs.opt_value_from_str("--fps")?;

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
            let exe = env::current_exe()?;
            let child = Command::new(exe).arg("--daemon").spawn()?;
            println!("rehabctl: started daemon (pid={})", child.id());
            Ok(())
        }

        Some("stop") => request(json!({"op":"shutdown"})),
        Some("status") => request(json!({"op":"status"})),
        Some("reload") => request(json!({"op":"reload"})),
        Some("list") => request(json!({"op":"list"})),

        Some("use") => {
            let name: String = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: rehabctl use <profile_name>"))?;
            request(json!({"op":"use","profile":name}))
        }

        Some("analyze") => {
            let usage = "usage: rehabctl analyze <exercise> <frame.json>";
            let exercise = exercise_arg(&mut pargs, usage)?;
            let path: String = pargs.free_from_str().map_err(|_| anyhow!(usage))?;
            let txt = fs::read_to_string(&path).with_context(|| format!("reading {path}"))?;
            let v: Value = serde_json::from_str(&txt).with_context(|| format!("parsing {path}"))?;
            let landmarks = landmarks_of(&v).clone();
            request(json!({
                "op": "analyze",
                "session": session.as_deref().unwrap_or("default"),
                "exercise_type": exercise.as_str(),
                "landmarks": landmarks,
            }))
        }

        Some("reset") => {
            let exercise = exercise_arg(&mut pargs, "usage: rehabctl reset <exercise>")?;
            request(json!({
                "op": "reset",
                "session": session.as_deref().unwrap_or("default"),
                "exercise_type": exercise.as_str(),
            }))
        }

        Some("summary") => request(json!({
            "op": "summary",
            "session": session.as_deref().unwrap_or("default"),
        })),

        Some("replay") => {
            let usage = "usage: rehabctl replay <exercise> <frames.jsonl> [--fps N]";
            let exercise = exercise_arg(&mut pargs, usage)?;
            let path: String = pargs.free_from_str().map_err(|_| anyhow!(usage))?;
            replay(exercise, &path, fps.unwrap_or(30))
        }

        Some("labels") => {
            for e in Exercise::ALL {
                let labels: Vec<&str> = exercises::label_set(e).iter().map(|l| l.as_str()).collect();
                println!("{:<20} {}", e.as_str(), labels.join(", "));
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

fn exercise_arg(pargs: &mut Arguments, usage: &str) -> Result<Exercise> {
    let name: String = pargs.free_from_str().map_err(|_| anyhow!("{usage}"))?;
    Ok(name.parse::<Exercise>()?)
}

/// Accept either a bare landmark array or an object carrying `landmarks`.
fn landmarks_of(v: &Value) -> &Value {
    match v {
        Value::Object(m) => m.get("landmarks").unwrap_or(&Value::Null),
        other => other,
    }
}

fn request(req: Value) -> Result<()> {
    let r = ipc::client_request(req)?;
    print_response(&r);
    Ok(())
}

/// Run a local session over recorded frames, one JSON frame per line.
fn replay(exercise: Exercise, path: &str, fps: u32) -> Result<()> {
    if fps == 0 {
        return Err(anyhow!("--fps must be positive"));
    }
    let cfg = DaemonConfigState::load_or_install_default()?;
    let mut session = Session::new(cfg.profile);

    let file = fs::File::open(path).with_context(|| format!("opening {path}"))?;
    let mut frames = 0u64;
    for (i, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let v: Value = serde_json::from_str(&line)
            .with_context(|| format!("{path}:{}: not JSON", i + 1))?;
        let at = v
            .get("t_ms")
            .and_then(Value::as_u64)
            .unwrap_or(frames * 1000 / u64::from(fps));
        let frame = Frame::from_json(landmarks_of(&v));
        let analysis = session.analyze_at(exercise, &frame, at);
        println!("{}", json!({"t_ms": at, "result": analysis}));
        frames += 1;
    }

    let tracker = session.tracker();
    println!(
        "{exercise}: {frames} frames, {} repetitions, ending in {}",
        tracker.repetition_count(exercise),
        tracker.current_label(exercise)
    );
    Ok(())
}

fn print_help() {
    println!(
        r#"rehabctl: hand rehabilitation exercise counter

USAGE:
  rehabctl help [command]                         Show general or command-specific help
  rehabctl start                                  Start the daemon
  rehabctl stop                                   Stop the daemon
  rehabctl status                                 Show daemon state
  rehabctl reload                                 Reload active profile
  rehabctl use <name>                             Switch active profile
  rehabctl list                                   List profiles
  rehabctl analyze <exercise> <frame.json>        Classify one frame  [--session S]
  rehabctl reset <exercise>                       Reset an exercise   [--session S]
  rehabctl summary                                Show session counts [--session S]
  rehabctl replay <exercise> <frames.jsonl>       Count reps offline  [--fps N]
  rehabctl labels                                 List each exercise's labels

EXERCISES:
  open_close, pinch, abduction_adduction, thumb_opposition, finger_lifts

TIPS:
  - Profiles: ~/.config/rehabctl/profiles
  - Active profile pointer: ~/.config/rehabctl/active
  - Socket: ~/.local/run/rehabctl.sock
"#
    );
}

fn print_subcmd_help(cmd: &str) {
    match cmd {
        "start" => println!("usage: rehabctl start\nStarts the background daemon."),
        "stop" => println!("usage: rehabctl stop\nStops the running daemon."),
        "status" => println!(
            "usage: rehabctl status\nShows active profile, debounce, socket and live sessions."
        ),
        "reload" => println!(
            "usage: rehabctl reload\nReloads the current profile; keeps last good on error."
        ),
        "use" => {
            println!("usage: rehabctl use <name>\nSwitches active profile to <name> and reloads.")
        }
        "list" => println!("usage: rehabctl list\nLists available profiles."),
        "analyze" => println!(
            "usage: rehabctl analyze <exercise> <frame.json> [--session S]\nSends one frame (a landmark array or {{\"landmarks\": [...]}}) to the daemon."
        ),
        "reset" => println!(
            "usage: rehabctl reset <exercise> [--session S]\nZeroes the repetition count of one exercise."
        ),
        "summary" => println!(
            "usage: rehabctl summary [--session S]\nShows state and repetitions for every exercise."
        ),
        "replay" => println!(
            "usage: rehabctl replay <exercise> <frames.jsonl> [--fps N]\nRuns frames through a local session. Lines may carry \"t_ms\"; otherwise frames are spaced at N fps (default 30)."
        ),
        "labels" => println!("usage: rehabctl labels\nLists the labels each classifier can emit."),
        _ => {
            eprintln!("unknown command: {cmd}\n");
            print_help();
        }
    }
}

fn print_response(v: &Value) {
    println!("{}", serde_json::to_string_pretty(v).unwrap_or_default());
}
