//! Subcommand implementations: wiring config, catalog and transport into a cell.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::{Duration, Instant};

use eyre::WrapErr;
use serde_json::json;
use sorter_config::{CatalogBackend, Config, DeviceKind};
use sorter_core::{Cell, DetectionSampler, MatchCfg, Matcher, SorterError};
use sorter_hardware::{CatalogRecord, MemoryCatalog, SimConfig, SimObject, SimPlant, SqliteCatalog};
use sorter_traits::clock::{Clock, MonotonicClock};
use sorter_traits::{Catalog, DetectedObject, Shape, Transport};

/// Read, parse and validate the TOML config. Every failure is a config error.
pub fn load_config(path: &Path) -> eyre::Result<Config> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| SorterError::Config(format!("read {}: {e}", path.display())))?;
    let cfg = sorter_config::load_toml(&text)
        .map_err(|e| SorterError::Config(format!("parse {}: {e}", path.display())))?;
    cfg.validate()
        .map_err(|e| SorterError::Config(e.to_string()))?;
    Ok(cfg)
}

/// Open the configured catalog backend.
pub fn open_catalog(cfg: &Config) -> eyre::Result<Box<dyn Catalog>> {
    match (cfg.catalog.backend, cfg.catalog.path.as_deref()) {
        (CatalogBackend::Csv, Some(path)) => {
            let rows = sorter_config::load_catalog_csv(Path::new(path))
                .map_err(|e| SorterError::Catalog(e.to_string()))?;
            let records = rows
                .iter()
                .map(|r| CatalogRecord::new(r.to_target(&cfg.matching.status_filter), r.status.clone()))
                .collect::<Vec<_>>();
            tracing::info!(path, records = records.len(), "catalog loaded from CSV");
            Ok(Box::new(MemoryCatalog::new(records)))
        }
        (CatalogBackend::Csv, None) => {
            tracing::warn!("catalog.path not set; starting with an empty catalog");
            Ok(Box::new(MemoryCatalog::new(Vec::new())))
        }
        (CatalogBackend::Json, Some(path)) => {
            let rows = sorter_config::load_catalog_json(Path::new(path), &cfg.matching.status_filter)
                .map_err(|e| SorterError::Catalog(e.to_string()))?;
            let records = rows
                .iter()
                .map(|r| CatalogRecord::new(r.to_target(&cfg.matching.status_filter), r.status.clone()))
                .collect::<Vec<_>>();
            tracing::info!(path, records = records.len(), "catalog loaded from JSON export");
            Ok(Box::new(MemoryCatalog::new(records)))
        }
        (CatalogBackend::Sqlite, Some(path)) => {
            let db = SqliteCatalog::open(path)
                .map_err(|e| SorterError::Catalog(format!("open {path}: {e}")))?;
            tracing::info!(path, "catalog opened (sqlite)");
            Ok(Box::new(db))
        }
        (CatalogBackend::Sqlite, None) => {
            Err(SorterError::Config("catalog.path is required for the sqlite backend".into()).into())
        }
        (CatalogBackend::Json, None) => {
            Err(SorterError::Config("catalog.path is required for the json backend".into()).into())
        }
    }
}

fn servo_of(cfg: &Config, kind: DeviceKind, id: u8) -> eyre::Result<u8> {
    cfg.actuator(kind, id)
        .map(|a| a.servo())
        .ok_or_else(|| SorterError::Config(format!("actuators: missing {} {id}", kind.as_str())).into())
}

/// A plant model loaded with one object per pending catalog record.
fn sim_plant(
    cfg: &Config,
    catalog: &mut dyn Catalog,
    clock: Arc<dyn Clock + Send + Sync>,
) -> eyre::Result<SimPlant> {
    const ANGLES: [f32; 4] = [10.0, -25.0, 40.0, 0.0];
    let pending = catalog
        .fetch_pending(&cfg.matching.status_filter)
        .map_err(|e| SorterError::Catalog(e.to_string()))?;
    let objects = pending
        .iter()
        .enumerate()
        .map(|(i, t)| SimObject {
            length_mm: t.length_mm,
            width_mm: t.width_mm,
            height_mm: t.height_mm,
            shape: t.shape,
            angle_deg: ANGLES[i % ANGLES.len()],
        })
        .collect::<Vec<_>>();
    tracing::info!(objects = objects.len(), "simulated plant loaded");
    let sim = SimConfig {
        conveyor1_servo: servo_of(cfg, DeviceKind::Conveyor, 1)?,
        pusher1_servo: servo_of(cfg, DeviceKind::Pusher, 1)?,
        pusher2_servo: servo_of(cfg, DeviceKind::Pusher, 2)?,
        height_scale: cfg.height.scale,
        height_offset: cfg.height.offset,
        frame_width_px: cfg.camera.frame_width_px,
        frame_height_px: cfg.camera.frame_height_px,
        objects,
        ..SimConfig::default()
    };
    Ok(SimPlant::new(sim, clock))
}

#[cfg(all(feature = "hardware", unix))]
fn connect_serial(cfg: &Config) -> eyre::Result<Box<dyn Transport>> {
    let t = sorter_hardware::SerialTransport::open(&cfg.serial.port, cfg.serial.baud)
        .map_err(|e| SorterError::TransportConnect(format!("{}: {e}", cfg.serial.port)))?;
    tracing::info!(port = %cfg.serial.port, baud = cfg.serial.baud, "serial controller connected");
    Ok(Box::new(t))
}

#[cfg(not(all(feature = "hardware", unix)))]
fn connect_serial(cfg: &Config) -> eyre::Result<Box<dyn Transport>> {
    Err(SorterError::TransportConnect(format!(
        "{}: built without the `hardware` feature (use --sim)",
        cfg.serial.port
    ))
    .into())
}

pub fn run(
    cfg: &Config,
    sim: bool,
    ticks: Option<u64>,
    tick_ms: Option<u64>,
    stop: &AtomicBool,
    json_out: bool,
) -> eyre::Result<()> {
    let mut catalog = open_catalog(cfg)?;
    let clock: Arc<dyn Clock + Send + Sync> = Arc::new(MonotonicClock::new());

    let plant = if sim {
        Some(sim_plant(cfg, catalog.as_mut(), clock.clone())?)
    } else {
        None
    };
    let transport: Box<dyn Transport> = match &plant {
        Some(p) => Box::new(p.transport()),
        None => connect_serial(cfg)?,
    };

    let mut builder = Cell::builder()
        .with_config(cfg)?
        .with_clock(clock)
        .with_transport(transport)
        .with_catalog(catalog);
    if let Some(ms) = tick_ms {
        builder = builder.with_tick_period(Duration::from_millis(ms));
    }
    let mut cell = builder.build()?;

    if let Some(p) = &plant {
        let sampler = DetectionSampler::spawn(
            p.camera(),
            p.detector(),
            cell.publisher(),
            cfg.camera.sample_rate_hz,
            Duration::from_millis(100),
            MonotonicClock::new(),
        );
        cell.attach_sampler(sampler);
    } else {
        tracing::warn!("no camera backend attached; detections must come from an external publisher");
    }

    cell.home().wrap_err("homing the cell")?;

    let started = Instant::now();
    let summary = cell.run(stop, ticks.unwrap_or(cfg.runner.max_ticks));
    let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

    tracing::info!(
        ticks = summary.ticks,
        processed = summary.processed,
        drained = summary.drained,
        final_state = %summary.final_state,
        "run finished"
    );

    if json_out {
        let line = json!({
            "timestamp": std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0),
            "ticks": summary.ticks,
            "processed": summary.processed,
            "final_state": summary.final_state.to_string(),
            "drained": summary.drained,
            "catalog_faults": cell.catalog_faults(),
            "write_faults": cell.gateway().write_faults(),
            "detections": cell.detections_published(),
            "duration_ms": duration_ms,
            "sim_delivered": plant.as_ref().map(SimPlant::delivered),
        });
        println!("{line}");
    } else {
        println!(
            "run complete: processed {} object(s) in {} ticks ({} ms)",
            summary.processed, summary.ticks, duration_ms
        );
    }
    Ok(())
}

pub fn self_check(cfg: &Config, json_out: bool) -> eyre::Result<()> {
    let mut catalog = open_catalog(cfg)?;
    let pending = catalog
        .fetch_pending(&cfg.matching.status_filter)
        .map_err(|e| SorterError::Catalog(e.to_string()))?;
    if json_out {
        println!(
            "{}",
            json!({
                "ok": true,
                "actuators": cfg.actuators.len(),
                "pending": pending.len(),
                "interlock_clear": cfg.interlock_clear_setpoint(),
            })
        );
    } else {
        println!(
            "self-check ok: {} actuators, {} pending catalog record(s)",
            cfg.actuators.len(),
            pending.len()
        );
    }
    Ok(())
}

pub fn match_one(
    cfg: &Config,
    length: f32,
    width: f32,
    height: f32,
    shape: &str,
    json_out: bool,
) -> eyre::Result<()> {
    let shape: Shape = shape
        .parse()
        .map_err(|e| eyre::eyre!("invalid --shape: {e}"))?;
    let mut catalog = open_catalog(cfg)?;
    let matcher = Matcher::new(MatchCfg::from(&cfg.matching));
    let measured = DetectedObject {
        length_mm: length,
        width_mm: width,
        height_mm: height,
        shape,
        ..DetectedObject::default()
    };
    let res = matcher.find(catalog.as_mut(), &measured)?;

    if json_out {
        let target = res.found().then(|| {
            json!({
                "length_mm": res.target_length_mm,
                "width_mm": res.target_width_mm,
                "height_mm": res.target_height_mm,
            })
        });
        println!(
            "{}",
            json!({
                "found": res.found(),
                "target_id": res.found().then_some(res.target_id.as_str()),
                "deviation_mm": res.found().then_some(res.deviation_mm),
                "target": target,
            })
        );
    } else if res.found() {
        println!(
            "match: {} ({} x {} x {} mm, deviation {:.1} mm)",
            res.target_id,
            res.target_length_mm,
            res.target_width_mm,
            res.target_height_mm,
            res.deviation_mm
        );
    } else {
        println!("no match");
    }
    Ok(())
}

pub fn send(cfg: &Config, sim: bool, line: &str, json_out: bool) -> eyre::Result<()> {
    let clock: Arc<dyn Clock + Send + Sync> = Arc::new(MonotonicClock::new());
    let transport: Box<dyn Transport> = if sim {
        let plant = SimPlant::new(SimConfig::default(), clock.clone());
        Box::new(plant.transport())
    } else {
        connect_serial(cfg)?
    };
    let mut cell = Cell::builder()
        .with_config(cfg)?
        .with_clock(clock)
        .with_transport(transport)
        .with_catalog(MemoryCatalog::new(Vec::new()))
        .build()?;

    let sent = cell.send_raw(line)?;
    if json_out {
        println!("{}", json!({ "sent": sent }));
    } else {
        println!("sent: {sent}");
    }
    Ok(())
}
