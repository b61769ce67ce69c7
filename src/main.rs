use anyhow::Result;
use kineticore::config::Config;
use kineticore::game::SquatDetector;
use kineticore::log;
use kineticore::logging::LogFile;
use kineticore::pipeline::CapturePipeline;
use kineticore::pose::landmarker::ensure_model;
use kineticore::server;

const CONFIG_PATH: &str = "kineticore.toml";

fn main() -> Result<()> {
    let config = Config::load_or_default(CONFIG_PATH);
    let logfile = LogFile::open("logs", "kineticore").unwrap_or_else(|e| {
        eprintln!("[log] could not create log file: {e:#}");
        LogFile::stderr_only()
    });

    log!(logfile, "KinetiCore Pose Server ({})", env!("GIT_VERSION"));
    log!(logfile,
        "[config] addr={}, tick={}ms, camera={} ({}x{}@{}), view={}, verbose={}",
        config.server.addr, config.server.tick_ms, config.camera.index,
        config.camera.width, config.camera.height, config.camera.fps,
        config.debug.view, config.debug.verbose
    );
    let d = &config.detector;
    log!(logfile,
        "[config] squat<{} rise>{} hand>{} joint>{} xp/rep={}",
        d.squat_threshold, d.rise_threshold, d.hand_visibility, d.joint_visibility, d.xp_per_rep
    );

    // 閾値の逆転と0msティックは起動時に弾く
    SquatDetector::from_config(&config.detector)?;
    config.server.tick()?;

    // blocking HTTP はランタイム外で行う
    if let Some(url) = &config.model.url {
        if ensure_model(&config.model.path, url)? {
            log!(logfile, "[model] downloaded {}", config.model.path);
        }
    }

    println!();
    println!("  WebSocket: ws://{}", config.server.addr);
    println!("  Open the game client, then stand in front of the webcam.");
    println!("  Press Q in the camera window to end a session.");
    println!();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(server::run(
        &config.server,
        || CapturePipeline::open(&config, &logfile),
        &logfile,
    ))
}
