// SPDX-License-Identifier: GPL-3.0-only
//! Live location provider backed by a gpsd daemon
//!
//! Speaks the gpsd JSON protocol: one `?WATCH` command, then a stream of
//! newline-delimited reports of which only `TPV` with a 2D/3D fix is used.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use navkit_shared::validation::validate_coordinate;
use navkit_shared::{Coordinate, Position};
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;

use super::{FixSink, LocationProvider};

const WATCH_COMMAND: &[u8] = b"?WATCH={\"enable\":true,\"json\":true}\n";

#[derive(Debug, Deserialize)]
struct GpsdReport {
    class: String,
    #[serde(default)]
    mode: u8,
    lat: Option<f64>,
    lon: Option<f64>,
    /// Course over ground, degrees from true north
    track: Option<f64>,
    /// m/s
    speed: Option<f64>,
    /// Estimated horizontal error, meters
    eph: Option<f64>,
    time: Option<String>,
}

/// Parse one gpsd report line into a position, if it carries a usable fix.
#[must_use]
pub fn parse_report(line: &str) -> Option<Position> {
    let report: GpsdReport = match serde_json::from_str(line) {
        Ok(report) => report,
        Err(e) => {
            debug!("Ignoring unparseable gpsd line: {e}");
            return None;
        }
    };
    if report.class != "TPV" || report.mode < 2 {
        return None;
    }

    let coordinate = Coordinate::new(report.lon?, report.lat?);
    if validate_coordinate(&coordinate).is_err() {
        return None;
    }

    let mut position = Position::new(coordinate);
    if let Some(track) = report.track {
        position = position.with_bearing(track);
    }
    position.speed = report.speed;
    position.accuracy = report.eph;
    if let Some(timestamp) = report
        .time
        .as_deref()
        .and_then(|time| DateTime::parse_from_rfc3339(time).ok())
    {
        position.timestamp = timestamp.with_timezone(&Utc);
    }
    Some(position)
}

pub struct GpsdProvider {
    address: String,
    task: Option<JoinHandle<()>>,
}

impl GpsdProvider {
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            task: None,
        }
    }
}

async fn stream_reports(address: &str, sink: &FixSink) -> Result<()> {
    let mut stream = TcpStream::connect(address)
        .await
        .with_context(|| format!("Failed to connect to gpsd at {address}"))?;
    stream
        .write_all(WATCH_COMMAND)
        .await
        .context("Failed to send WATCH command to gpsd")?;
    info!("Connected to gpsd at {address}");

    let mut lines = BufReader::new(stream).lines();
    while let Some(line) = lines.next_line().await.context("Failed to read from gpsd")? {
        if let Some(position) = parse_report(&line)
            && !sink.push(position)
        {
            debug!("gpsd reader stopped: session gone");
            return Ok(());
        }
    }
    anyhow::bail!("gpsd closed the connection")
}

impl LocationProvider for GpsdProvider {
    fn name(&self) -> &'static str {
        "gpsd"
    }

    fn start(&mut self, sink: FixSink) -> Result<()> {
        self.stop();
        let address = self.address.clone();
        self.task = Some(tokio::spawn(async move {
            if let Err(e) = stream_reports(&address, &sink).await {
                warn!("gpsd provider lost: {e:#}");
                sink.lost(format!("{e:#}"));
            }
        }));
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            debug!("gpsd provider stopped");
        }
    }
}

impl Drop for GpsdProvider {
    fn drop(&mut self) {
        self.stop();
    }
}
