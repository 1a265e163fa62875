// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-solar-scada project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

use handlebars::Handlebars;
use rocket::fairing::{Fairing, Info, Kind};
use rocket::figment::Figment;
use rocket::http::Header;
use rocket::response::content::RawHtml;
use rocket::serde::json::Json;
use rocket::{get, options, routes, Build, Rocket, State};
use rocket::{Request, Response};
use rocket_okapi::{openapi, openapi_get_routes, rapidoc::*, settings::UrlObject};
use std::path::PathBuf;

use super::report::{derive_report, ScadaReport};
use crate::scada::{LoopPhase, ScadaSnapshot, StateReader, SystemStatus};

const STATUS_TEMPLATE: &str = include_str!("../../resources/status.html.hbs");

/// Per-server report parameters, managed as Rocket state.
#[derive(Debug, Clone)]
pub struct ReportContext {
    /// Installed plant capacity, kW.
    pub capacity_kw: f64,
}

pub struct CORS;

#[rocket::async_trait]
impl Fairing for CORS {
    fn info(&self) -> Info {
        Info {
            name: "Add CORS headers to responses",
            kind: Kind::Response,
        }
    }

    async fn on_response<'r>(&self, _request: &'r Request<'_>, response: &mut Response<'r>) {
        response.set_header(Header::new("Access-Control-Allow-Origin", "*"));
        response.set_header(Header::new(
            "Access-Control-Allow-Methods",
            "POST, GET, PUT, DELETE, OPTIONS",
        ));
        response.set_header(Header::new("Access-Control-Allow-Headers", "*"));
        response.set_header(Header::new("Access-Control-Allow-Credentials", "true"));
    }
}

/// Answers to OPTIONS requests
#[options("/<_path..>")]
async fn cors_options(_path: PathBuf) -> Result<(), std::io::Error> {
    Ok(())
}

pub async fn build_rocket(
    figment: Figment,
    reader: StateReader,
    report_context: ReportContext,
) -> Rocket<Build> {
    let mut templates = Handlebars::new();
    if let Err(e) = templates.register_template_string("status", STATUS_TEMPLATE) {
        eprintln!("Failed to register status page template: {}", e);
        std::process::exit(1);
    }

    rocket::custom(figment)
        .attach(CORS)
        .mount("/scada", openapi_get_routes![scada_data, scada_report])
        .mount("/", routes![status_page, cors_options])
        .mount(
            "/rapidoc/",
            make_rapidoc(&RapiDocConfig {
                general: GeneralConfig {
                    spec_urls: vec![UrlObject::new("Scada", "../scada/openapi.json")],
                    ..Default::default()
                },
                hide_show: HideShowConfig {
                    allow_spec_url_load: false,
                    allow_spec_file_load: false,
                    ..Default::default()
                },
                ..Default::default()
            }),
        )
        .manage(reader)
        .manage(report_context)
        .manage(templates)
}

/// # Raw telemetry
///
/// Every field of the current SCADA snapshot as flat JSON. Two polls within
/// the same slow-tick interval return identical values.
#[openapi(tag = "Scada")]
#[get("/data")]
async fn scada_data(state: &State<StateReader>) -> Json<ScadaSnapshot> {
    Json(state.snapshot())
}

/// # Derived generation report
///
/// Higher-level computed view of the same snapshot; a pure transform with
/// no side effects.
#[openapi(tag = "Scada")]
#[get("/report")]
async fn scada_report(
    state: &State<StateReader>,
    report_context: &State<ReportContext>,
) -> Json<ScadaReport> {
    Json(derive_report(&state.snapshot(), report_context.capacity_kw))
}

fn status_label(snapshot: &ScadaSnapshot, phase: LoopPhase) -> &'static str {
    if phase == LoopPhase::Calibrating {
        return "CALIBRATING";
    }
    match snapshot.system_status {
        SystemStatus::Offline => "OFFLINE",
        SystemStatus::Online => "ONLINE",
        SystemStatus::Fault => "FAULT",
    }
}

/// Minimal human-readable rendering of the current snapshot.
#[get("/")]
async fn status_page(
    state: &State<StateReader>,
    templates: &State<Handlebars<'static>>,
) -> RawHtml<String> {
    let snapshot = state.snapshot();
    let phase = state.phase();
    let context = serde_json::json!({
        "status": status_label(&snapshot, phase),
        "phase": phase.as_str(),
        "current_rms_amps": format!("{:.3}", snapshot.current_rms_amps),
        "voltage_volts": format!("{:.1}", snapshot.voltage_volts),
        "ac_power_kw": format!("{:.3}", snapshot.ac_power_kw),
        "total_energy_kwh": format!("{:.4}", snapshot.total_energy_kwh),
        "grid_frequency_hz": format!("{:.2}", snapshot.grid_frequency_hz),
        "power_factor": format!("{:.3}", snapshot.power_factor),
        "ambient_temp_c": format!("{:.1}", snapshot.ambient_temp_c),
        "irradiance_w_m2": format!("{:.0}", snapshot.irradiance_w_m2),
        "efficiency": format!("{:.3}", snapshot.efficiency),
        "timestamp_millis": snapshot.timestamp_millis,
    });
    match templates.render("status", &context) {
        Ok(html) => RawHtml(html),
        Err(e) => {
            log::error!("Status page rendering failed: {}", e);
            RawHtml(format!(
                "<html><body><h1>Solar SCADA Gateway</h1><p>Status: {}</p></body></html>",
                status_label(&snapshot, phase)
            ))
        }
    }
}
