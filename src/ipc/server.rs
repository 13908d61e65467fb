use anyhow::{Result, anyhow};
use log::{debug, error, info, warn};
use std::{
    collections::HashMap,
    io::{BufRead, BufReader, ErrorKind, Write},
    os::unix::net::{UnixListener, UnixStream},
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
        mpsc::{Receiver, Sender, channel},
    },
    thread,
    time::{Duration, Instant},
};

use super::dispatch::handle_request;
use super::runtime::socket_path;
use super::watch::watch_profiles;
use crate::config::{DaemonConfigState, Profile};
use crate::session::Session;

/// Sessions untouched for this long are dropped by the accept loop.
pub const SESSION_IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

pub enum IpcMsg {
    /// A profile file changed; carries its name (file stem).
    ProfileChanged(String),
    Shutdown,
}

struct SessionSlot {
    session: Arc<Mutex<Session>>,
    last_used: Instant,
}

type SessionMap = HashMap<String, SessionSlot>;

/// Shared daemon state. `cfg` and `sessions` are never locked together, and
/// each session has its own lock so clients do not serialize on each other.
pub struct DaemonState {
    cfg: Mutex<DaemonConfigState>,
    sessions: Mutex<SessionMap>,
}

impl DaemonState {
    pub fn new(cfg: DaemonConfigState) -> Self {
        Self {
            cfg: Mutex::new(cfg),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_config<T>(&self, f: impl FnOnce(&mut DaemonConfigState) -> T) -> Result<T> {
        let mut cfg = self.cfg.lock().map_err(|_| anyhow!("config lock poisoned"))?;
        Ok(f(&mut cfg))
    }

    fn sessions(&self) -> Result<std::sync::MutexGuard<'_, SessionMap>> {
        self.sessions
            .lock()
            .map_err(|_| anyhow!("session registry lock poisoned"))
    }

    /// Fetch a session, creating it with the current profile on first use.
    pub fn session(&self, name: &str) -> Result<Arc<Mutex<Session>>> {
        if let Some(slot) = self.sessions()?.get_mut(name) {
            slot.last_used = Instant::now();
            return Ok(slot.session.clone());
        }
        let profile = self.with_config(|c| c.profile.clone())?;
        let mut sessions = self.sessions()?;
        let slot = sessions.entry(name.to_string()).or_insert_with(|| {
            info!("session '{name}' started");
            SessionSlot {
                session: Arc::new(Mutex::new(Session::new(profile))),
                last_used: Instant::now(),
            }
        });
        slot.last_used = Instant::now();
        Ok(slot.session.clone())
    }

    /// Drop sessions idle for at least `max_idle`; returns how many went.
    pub fn evict_idle(&self, max_idle: Duration) -> Result<usize> {
        let mut sessions = self.sessions()?;
        let before = sessions.len();
        sessions.retain(|name, slot| {
            let keep = slot.last_used.elapsed() < max_idle;
            if !keep {
                info!("session '{name}' evicted after {:?} idle", slot.last_used.elapsed());
            }
            keep
        });
        Ok(before - sessions.len())
    }

    pub fn end_session(&self, name: &str) -> Result<bool> {
        let removed = self.sessions()?.remove(name).is_some();
        if removed {
            info!("session '{name}' ended");
        }
        Ok(removed)
    }

    pub fn session_names(&self) -> Result<Vec<String>> {
        let mut v: Vec<String> = self.sessions()?.keys().cloned().collect();
        v.sort();
        Ok(v)
    }

    /// Reload only when `name` is the active profile; returns whether it was.
    pub fn profile_changed(&self, name: &str) -> Result<bool> {
        let active = self.with_config(|c| c.active_name == name)?;
        if !active {
            debug!("ignoring change to inactive profile '{name}'");
            return Ok(false);
        }
        self.reload()?;
        Ok(true)
    }

    /// Re-read the active profile and push it to every live session.
    pub fn reload(&self) -> Result<String> {
        let (name, profile) = self.with_config(|c| -> Result<(String, Profile)> {
            c.reload()?;
            Ok((c.active_name.clone(), c.profile.clone()))
        })??;
        self.apply_profile(&profile)?;
        info!("profile '{name}' reloaded");
        Ok(name)
    }

    pub fn use_profile(&self, name: &str) -> Result<String> {
        let profile = self.with_config(|c| -> Result<Profile> {
            c.set_active(name)?;
            Ok(c.profile.clone())
        })??;
        self.apply_profile(&profile)?;
        info!("switched active profile to {name}");
        Ok(name.to_string())
    }

    fn apply_profile(&self, profile: &Profile) -> Result<()> {
        let live: Vec<Arc<Mutex<Session>>> = self
            .sessions()?
            .values()
            .map(|slot| slot.session.clone())
            .collect();
        for s in live {
            s.lock()
                .map_err(|_| anyhow!("session lock poisoned"))?
                .set_profile(profile.clone());
        }
        Ok(())
    }
}

pub fn run_daemon() -> Result<()> {
    // socket
    let sock = socket_path()?;
    if sock.exists() {
        let _ = std::fs::remove_file(&sock);
    }
    let listener = UnixListener::bind(&sock)?;
    info!("daemon: listening on {}", sock.display());

    // state
    let cfg = DaemonConfigState::load_or_install_default()?;
    info!("daemon: active profile '{}'", cfg.active_name);
    let profiles_dir = cfg.profiles_dir.clone();
    let state = Arc::new(DaemonState::new(cfg));

    // channels
    let (tx_req, rx_req) = channel::<IpcMsg>();

    // profile watcher; the daemon still works without it
    let _watcher = match watch_profiles(&profiles_dir, tx_req.clone()) {
        Ok(w) => Some(w),
        Err(e) => {
            warn!("not watching {}: {e}", profiles_dir.display());
            None
        }
    };

    // signals
    let term = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(signal_hook::consts::SIGINT, Arc::clone(&term))?;
    signal_hook::flag::register(signal_hook::consts::SIGTERM, Arc::clone(&term))?;

    // accept loop
    listener.set_nonblocking(true)?;
    let mut last_sweep = Instant::now();
    while !term.load(Ordering::Relaxed) {
        match listener.accept() {
            Ok((stream, _)) => {
                let st = Arc::clone(&state);
                let tx = tx_req.clone();
                thread::spawn(move || {
                    if let Err(e) = handle_client(stream, &st, &tx) {
                        error!("ipc client error: {e}");
                    }
                });
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => {}
            Err(e) => warn!("accept failed: {e}"),
        }

        if drain_messages(&rx_req, &state) {
            break;
        }

        if last_sweep.elapsed() >= SWEEP_INTERVAL {
            if let Err(e) = state.evict_idle(SESSION_IDLE_TIMEOUT) {
                warn!("session sweep failed: {e}");
            }
            last_sweep = Instant::now();
        }

        thread::sleep(Duration::from_millis(5));
    }

    let _ = std::fs::remove_file(&sock);
    info!("daemon: stopped");
    Ok(())
}

/// Returns true once shutdown was requested.
fn drain_messages(rx: &Receiver<IpcMsg>, state: &DaemonState) -> bool {
    while let Ok(msg) = rx.try_recv() {
        match msg {
            IpcMsg::ProfileChanged(name) => {
                if let Err(e) = state.profile_changed(&name) {
                    warn!("reload failed, keeping last good profile: {e}");
                }
            }
            IpcMsg::Shutdown => return true,
        }
    }
    false
}

fn handle_client(stream: UnixStream, st: &DaemonState, tx: &Sender<IpcMsg>) -> Result<()> {
    stream.set_nonblocking(false)?;
    let mut writer = stream.try_clone()?;
    let reader = BufReader::new(stream);

    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let resp = match serde_json::from_str::<serde_json::Value>(&line) {
            Ok(req) => handle_request(&req, st, tx),
            Err(e) => serde_json::json!({"ok": false, "error": format!("bad request: {e}")}),
        };
        writeln!(writer, "{resp}")?;
    }
    Ok(())
}

// client helper
pub fn client_request(req: serde_json::Value) -> Result<serde_json::Value> {
    let sock = socket_path()?;
    if !sock.exists() {
        return Err(anyhow!(
            "rehabctl daemon is not running (socket missing at {})",
            sock.display()
        ));
    }
    let mut stream = UnixStream::connect(sock)?;
    let line = serde_json::to_string(&req)? + "\n";
    stream.write_all(line.as_bytes())?;
    stream.shutdown(std::net::Shutdown::Write)?;
    let mut reader = BufReader::new(stream);
    let mut resp = String::new();
    reader.read_line(&mut resp)?;
    let v: serde_json::Value = serde_json::from_str(&resp)?;
    Ok(v)
}
