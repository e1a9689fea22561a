//! Relay server with a simulated target page.
//!
//! Run with: cargo run -p relay-server
//!
//! Then open http://localhost:3000 in your browser to watch the simulated
//! video through the relay. Set `RELAY_ADDR` to change the listen address
//! and `MEDIA_MONITOR_CONFIG` to load a JSON config file.

use std::{
    net::SocketAddr,
    sync::{Arc, Weak},
    time::Duration,
};

use axum::{Router, response::Html, routing::get};
use media_monitor_core::{MessageBus, MonitorConfig, TimeRanges};
use media_monitor_relay::{
    RelayHub, RuntimeUplink, TargetProxy, TargetTable, websocket::create_relay_router,
};
use media_monitor_target::{
    MediaElement, MediaEventKind, MediaManager, MediaNode,
    testing::{FakeDocument, FakeMediaElement},
};
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Relay key of the simulated page.
const PAGE_KEY: &str = "1";

const TICK: Duration = Duration::from_millis(250);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = match std::env::var("MEDIA_MONITOR_CONFIG") {
        Ok(path) => MonitorConfig::from_path(&path)?,
        Err(_) => MonitorConfig::default(),
    };
    let addr: SocketAddr = match std::env::var("RELAY_ADDR") {
        Ok(addr) => addr.parse()?,
        Err(_) => SocketAddr::from(([127, 0, 0, 1], 3000)),
    };

    // Hub with one simulated target page behind it
    let table = TargetTable::new();
    let hub = Arc::new(RelayHub::new(config.clone(), table.clone()));

    let page = MessageBus::new("page");
    let _page_dispatcher = page.spawn_dispatcher();

    let weak: Weak<RelayHub> = Arc::downgrade(&hub);
    let uplink: Weak<dyn RuntimeUplink> = weak;
    let proxy = TargetProxy::new(PAGE_KEY, config.clone(), page.clone(), uplink);
    proxy.attach();
    table.insert(proxy);

    let document = FakeDocument::new();
    let video = Arc::new(
        FakeMediaElement::new("VIDEO")
            .with_id("player")
            .with_class("demo"),
    );
    let node: MediaNode = video.clone();
    document.append(node);

    let manager = MediaManager::new(config, document, page.clone(), page);
    manager.initialize();

    tokio::spawn(simulate_playback(video));

    // Build router
    let app = Router::new()
        .route("/", get(index_handler))
        .merge(create_relay_router(hub))
        .layer(CorsLayer::permissive());

    // Start server
    tracing::info!("Relay listening on http://{addr} (page key {PAGE_KEY})");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    manager.destroy();
    Ok(())
}

async fn index_handler() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// Drives the fake video like a real player would: loads it, then advances
/// time while playing and reports changes made by remote commands.
async fn simulate_playback(video: Arc<FakeMediaElement>) {
    video.update(|p| {
        p.duration = 60.0;
        p.video_width = 1280;
        p.video_height = 720;
        p.ready_state = 4;
        p.src = "https://example.com/demo.mp4".to_string();
        p.current_src.clone_from(&p.src);
        p.seekable = [(0.0, 60.0)].into_iter().collect::<TimeRanges>();
        p.paused = false;
    });
    for kind in [
        MediaEventKind::LoadStart,
        MediaEventKind::DurationChange,
        MediaEventKind::LoadedMetadata,
        MediaEventKind::Resize,
        MediaEventKind::LoadedData,
        MediaEventKind::CanPlay,
        MediaEventKind::Play,
        MediaEventKind::Playing,
    ] {
        video.dispatch(kind);
    }

    let mut last = video.properties();
    let mut interval = tokio::time::interval(TICK);
    loop {
        interval.tick().await;

        let now = video.properties();
        if now.paused != last.paused {
            video.dispatch(if now.paused {
                MediaEventKind::Pause
            } else {
                MediaEventKind::Playing
            });
        }
        if (now.volume - last.volume).abs() > f64::EPSILON || now.muted != last.muted {
            video.dispatch(MediaEventKind::VolumeChange);
        }
        if (now.playback_rate - last.playback_rate).abs() > f64::EPSILON {
            video.dispatch(MediaEventKind::RateChange);
        }
        if (now.current_time - last.current_time).abs() > f64::EPSILON {
            video.dispatch(MediaEventKind::Seeked);
        }

        if !now.paused {
            let step = TICK.as_secs_f64() * now.playback_rate;
            let ended = now.current_time + step >= now.duration;
            video.update(|p| {
                p.current_time = if ended { 0.0 } else { p.current_time + step };
                p.played = [(0.0, p.current_time)].into_iter().collect::<TimeRanges>();
                p.buffered = [(0.0, (p.current_time + 10.0).min(p.duration))]
                    .into_iter()
                    .collect::<TimeRanges>();
            });
            video.dispatch(MediaEventKind::TimeUpdate);
            if ended {
                video.dispatch(MediaEventKind::Ended);
            }
        }

        last = video.properties();
    }
}

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html>
<head>
    <title>Media Monitor - Relay</title>
    <style>
        body {
            margin: 0;
            padding: 20px;
            background: #1e1e1e;
            color: #d4d4d4;
            font-family: system-ui, sans-serif;
        }
        h1 { color: #fff; margin-bottom: 10px; }
        .status { color: #888; font-size: 14px; margin-bottom: 10px; }
        .connected { color: #4a4; }
        .disconnected { color: #a44; }
        #log { font-family: Menlo, Monaco, monospace; font-size: 12px; white-space: pre; }
    </style>
</head>
<body>
    <h1>Media Monitor</h1>
    <div class="status" id="status">Connecting...</div>
    <div>
        <button onclick="command('play')">Play</button>
        <button onclick="command('pause')">Pause</button>
        <button onclick="command('setMuted', true)">Mute</button>
        <button onclick="command('setMuted', false)">Unmute</button>
        <button onclick="command('setPlaybackRate', 2)">2x</button>
        <button onclick="command('setCurrentTime', 0)">Rewind</button>
    </div>
    <div id="log"></div>

    <script>
        const TAB_ID = '1';
        const status = document.getElementById('status');
        const log = document.getElementById('log');
        let ws;
        let current = null;

        function send(message) {
            if (ws && ws.readyState === WebSocket.OPEN) {
                ws.send(JSON.stringify(message));
            }
        }

        function command(name, value) {
            if (current) {
                send({ action: 'mediaEvent', src: 'mm-devtools', tabId: TAB_ID, guid: current, name, value });
            }
        }

        function connect() {
            const protocol = window.location.protocol === 'https:' ? 'wss:' : 'ws:';
            ws = new WebSocket(`${protocol}//${window.location.host}/relay`);

            ws.onopen = () => {
                status.textContent = 'Connected';
                status.className = 'status connected';
                send({ name: 'mm-init', tabId: TAB_ID });
                send({ action: 'ready', src: 'mm-devtools', tabId: TAB_ID });
            };

            ws.onclose = () => {
                status.textContent = 'Disconnected - reconnecting...';
                status.className = 'status disconnected';
                current = null;
                setTimeout(connect, 2000);
            };

            ws.onmessage = (event) => {
                const msg = JSON.parse(event.data);
                if (msg.action === 'register') {
                    current = current || msg.guid;
                    log.textContent += `register ${msg.guid} ${msg.selector}\n`;
                } else if (msg.action === 'unregister') {
                    log.textContent += `unregister ${msg.guid}\n`;
                } else if (msg.action === 'mediaEvent' && msg.name !== 'timeupdate') {
                    log.textContent += `${msg.guid} ${msg.name}\n`;
                } else if (msg.action === 'ready') {
                    send({ action: 'ready', src: 'mm-devtools', tabId: TAB_ID });
                }
            };
        }

        connect();
    </script>
</body>
</html>
"#;
