use anyhow::Result;
use log::{error, info};
use std::{
    io::{BufRead, BufReader, Write},
    os::unix::net::{UnixListener, UnixStream},
    sync::mpsc::{Sender, channel},
    sync::{Arc, Mutex},
    thread,
    time::Duration,
};

use super::pipeline::{PipelineMsg, SharedReport, run_pipeline};
use super::runtime::socket_path;
use crate::config::{DaemonConfigState, overrides_from_json};

pub fn run_daemon() -> Result<()> {
    // socket
    let sock = socket_path();
    if sock.exists() {
        let _ = std::fs::remove_file(&sock);
    }
    let listener = UnixListener::bind(&sock)?;
    info!("daemon: listening on {}", sock.display());

    // state
    let mut state = DaemonState::new()?;
    info!("daemon: active profile '{}'", state.cfg.active_name);

    // channels
    let (tx_req, rx_req) = channel::<IpcMsg>();

    // pipeline thread
    let pipeline = PipelineHandle::start(&state)?;

    // accept loop
    listener.set_nonblocking(true)?;
    loop {
        match listener.accept() {
            Ok((stream, _)) => {
                let tx = tx_req.clone();
                let st_snapshot = state.clone_shallow();
                let latest = pipeline.latest.clone();
                thread::spawn(move || {
                    if let Err(e) = handle_client(stream, st_snapshot, tx, latest) {
                        error!("ipc client error: {e}");
                    }
                });
            }
            Err(_) => {}
        }

        while let Ok(msg) = rx_req.try_recv() {
            match msg {
                IpcMsg::Reload => {
                    if let Err(e) = state.cfg.reload() {
                        error!("reload failed: {e}");
                    } else {
                        pipeline.apply_profile(&state);
                        info!("profile reloaded");
                    }
                }
                IpcMsg::UseProfile(name) => {
                    if let Err(e) = state.cfg.set_active(&name) {
                        error!("use profile failed: {e}");
                    } else {
                        pipeline.apply_profile(&state);
                        info!("switched active profile to {}", state.cfg.active_name);
                    }
                }
                IpcMsg::SetParams(map) => {
                    let _ = pipeline.tx.send(PipelineMsg::ApplyOverrides(map));
                }
                IpcMsg::Reset => {
                    let _ = pipeline.tx.send(PipelineMsg::Reset);
                }
                IpcMsg::Shutdown => {
                    let _ = pipeline.tx.send(PipelineMsg::Shutdown);
                    return Ok(());
                }
            }
        }

        thread::sleep(Duration::from_millis(5));
    }
}

fn handle_client(
    mut stream: UnixStream,
    st: DaemonState,
    tx_req: Sender<IpcMsg>,
    latest: SharedReport,
) -> Result<()> {
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut line = String::new();
    reader.read_line(&mut line)?;
    if line.trim().is_empty() {
        return Ok(());
    }
    let req: serde_json::Value = serde_json::from_str(&line)?;
    let op = req.get("op").and_then(|v| v.as_str()).unwrap_or("");

    let resp = match op {
        "status" => {
            let mode = latest
                .lock()
                .ok()
                .and_then(|s| s.as_ref().map(|r| r.control_mode.as_str()))
                .unwrap_or("unknown");
            serde_json::json!({"ok": true, "data": {
                "active_profile": st.cfg.active_name,
                "socket": socket_path(),
                "performance_mode": st.cfg.profile.daemon.performance_mode.as_str(),
                "control_mode": mode,
            }})
        }
        "state" => {
            let snapshot = latest.lock().ok().and_then(|s| s.clone());
            match snapshot {
                Some(report) => serde_json::json!({"ok": true, "data": report}),
                None => serde_json::json!({"ok": false, "error": "no frame processed yet"}),
            }
        }
        "reload" => {
            let _ = tx_req.send(IpcMsg::Reload);
            serde_json::json!({"ok": true, "data": {"active_profile": st.cfg.active_name}})
        }
        "use" => {
            let name = req.get("profile").and_then(|v| v.as_str()).unwrap_or("");
            let _ = tx_req.send(IpcMsg::UseProfile(name.to_string()));
            serde_json::json!({"ok": true, "data": {"active_profile": name}})
        }
        "list" => {
            let list = st.cfg.list_profiles();
            serde_json::json!({"ok": true, "data": {"profiles": list, "active": st.cfg.active_name}})
        }
        "set" => {
            let params = req
                .get("params")
                .map(overrides_from_json)
                .unwrap_or_default();
            let count = params.len();
            let _ = tx_req.send(IpcMsg::SetParams(params));
            serde_json::json!({"ok": true, "data": {"applied": count}})
        }
        "reset" => {
            let _ = tx_req.send(IpcMsg::Reset);
            serde_json::json!({"ok": true, "data": "engine reset"})
        }
        "doctor" => {
            let report = st.cfg.doctor_report();
            serde_json::json!({"ok": true, "data": report})
        }
        "shutdown" => {
            let _ = tx_req.send(IpcMsg::Shutdown);
            let _ = writeln!(
                stream,
                "{}",
                serde_json::json!({"ok": true, "data": "shutting down"})
            );
            std::process::exit(0);
        }
        _ => serde_json::json!({"ok": false, "error": format!("unknown op: {op}")}),
    };

    writeln!(stream, "{resp}")?;
    Ok(())
}

struct DaemonState {
    pub cfg: DaemonConfigState,
}

impl DaemonState {
    fn new() -> Result<Self> {
        let cfg = DaemonConfigState::load_or_install_default()?;
        Ok(Self { cfg })
    }
    fn clone_shallow(&self) -> Self {
        Self {
            cfg: self.cfg.clone(),
        }
    }
}

enum IpcMsg {
    Reload,
    UseProfile(String),
    SetParams(std::collections::HashMap<String, f64>),
    Reset,
    Shutdown,
}

struct PipelineHandle {
    tx: Sender<PipelineMsg>,
    latest: SharedReport,
    _thread: thread::JoinHandle<()>,
}

impl PipelineHandle {
    fn start(state: &DaemonState) -> Result<Self> {
        let (tx, rx) = channel::<PipelineMsg>();
        let latest: SharedReport = Arc::new(Mutex::new(None));
        let shared = latest.clone();
        let profile = state.cfg.profile.clone();
        let handle = thread::spawn(move || {
            if let Err(e) = run_pipeline(profile, rx, shared) {
                error!("pipeline failed: {e}");
            }
        });
        Ok(Self {
            tx,
            latest,
            _thread: handle,
        })
    }

    fn apply_profile(&self, state: &DaemonState) {
        let _ = self
            .tx
            .send(PipelineMsg::ApplyProfile(Box::new(state.cfg.profile.clone())));
    }
}

// client helper
pub fn client_request(req: serde_json::Value) -> Result<serde_json::Value> {
    let sock = socket_path();
    if !sock.exists() {
        return Err(anyhow::anyhow!(
            "padctl daemon is not running (socket missing at {})",
            sock.display()
        ));
    }
    let mut stream = UnixStream::connect(sock)?;
    let line = serde_json::to_string(&req)? + "\n";
    stream.write_all(line.as_bytes())?;
    let mut reader = BufReader::new(stream);
    let mut resp = String::new();
    reader.read_line(&mut resp)?;
    let v: serde_json::Value = serde_json::from_str(&resp)?;
    Ok(v)
}
