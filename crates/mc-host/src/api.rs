//! # Status API
//!
//! A REST and WebSocket API exposing the machine's status snapshot and
//! accepting G-code for dispatch, for web front-ends and scripted clients.
//!
//! * `GET /api/status`: the current `MachineSnapshot`.
//! * `POST /api/gcode`: a newline-separated body of G-code lines to queue.
//! * `GET /ws`: a stream of status snapshots, pushed on change plus a
//!   periodic heartbeat.

use crate::gcode::{parse_gcode, GCode};
use crate::state::MachineState;
use actix::prelude::*;
use actix_web::{get, post, web, App, Error, HttpRequest, HttpResponse, HttpServer, Responder};
use actix_web_actors::ws;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::Sender;
use tracing::{info, warn};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);
const CLIENT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct AppState {
    pub machine_state: Arc<Mutex<MachineState>>,
    pub gcode_sender: Sender<GCode>,
}

struct WebSocketSession {
    hb: Instant,
    app_state: AppState,
    last_state: String,
}

impl Actor for WebSocketSession {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        self.hb(ctx);
        self.send_state_update(ctx);
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for WebSocketSession {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(msg)) => {
                self.hb = Instant::now();
                ctx.pong(&msg);
            }
            Ok(ws::Message::Pong(_)) => {
                self.hb = Instant::now();
            }
            Ok(ws::Message::Text(text)) => {
                info!("ws: received text: {text}");
            }
            Ok(ws::Message::Close(reason)) => {
                ctx.close(reason);
                ctx.stop();
            }
            _ => ctx.stop(),
        }
    }
}

impl WebSocketSession {
    fn hb(&self, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.run_interval(HEARTBEAT_INTERVAL, |act, ctx| {
            if Instant::now().duration_since(act.hb) > CLIENT_TIMEOUT {
                warn!("websocket client heartbeat failed, disconnecting");
                ctx.stop();
                return;
            }
            ctx.ping(b"");
            act.send_state_update(ctx);
        });
    }

    fn send_state_update(&mut self, ctx: &mut ws::WebsocketContext<Self>) {
        let snapshot = self.app_state.machine_state.lock().snapshot();
        if let Ok(json) = serde_json::to_string(&snapshot) {
            if json != self.last_state {
                ctx.text(json.clone());
                self.last_state = json;
            }
        }
    }
}

async fn websocket_handler(req: HttpRequest, stream: web::Payload, data: web::Data<AppState>) -> Result<HttpResponse, Error> {
    ws::start(WebSocketSession { hb: Instant::now(), app_state: data.get_ref().clone(), last_state: String::new() }, &req, stream)
}

#[get("/api/status")]
async fn machine_status(data: web::Data<AppState>) -> impl Responder {
    let snapshot = data.machine_state.lock().snapshot();
    HttpResponse::Ok().json(snapshot)
}

#[post("/api/gcode")]
async fn send_gcode(body: String, data: web::Data<AppState>) -> impl Responder {
    info!("received G-code via API: {body}");
    for line in body.lines() {
        if let Some(gcode) = parse_gcode(line) {
            if let Err(e) = data.gcode_sender.send(gcode).await {
                tracing::error!("failed to send G-code from API to dispatcher: {e}");
                return HttpResponse::InternalServerError().body("failed to queue G-code command");
            }
        }
    }
    HttpResponse::Ok().json(serde_json::json!({"status": "ok"}))
}

/// Starts the Actix web server.
pub fn start_api_server(port: u16, app_state: AppState) -> std::io::Result<actix_web::dev::Server> {
    let server = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .service(machine_status)
            .service(send_gcode)
            .route("/ws", web::get().to(websocket_handler))
    })
    .bind(("0.0.0.0", port))?
    .run();
    Ok(server)
}
