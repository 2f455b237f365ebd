use std::io;
use std::sync::Mutex;

use actix_web::dev::ServerHandle;
use actix_web::{get, web, App, HttpResponse, HttpServer, Responder};
use rs_tweet_core::scheduler::status::{SchedulerStatus, SharedStatus};

/// HTTP GET endpoint `/v1/status`
///
/// Returns the scheduler snapshot as JSON.
#[get("/v1/status")]
async fn get_status(data: web::Data<Mutex<SchedulerStatus>>) -> impl Responder {
	let status = match data.lock() {
		Ok(status) => status.clone(),
		Err(_) => return HttpResponse::InternalServerError().body("Status lock failed"),
	};
	HttpResponse::Ok().json(status)
}

/// HTTP GET endpoint `/v1/last_message`
///
/// Returns the last published message as plain text, 404 before the first one.
#[get("/v1/last_message")]
async fn get_last_message(data: web::Data<Mutex<SchedulerStatus>>) -> impl Responder {
	let last_message = match data.lock() {
		Ok(status) => status.last_message.clone(),
		Err(_) => return HttpResponse::InternalServerError().body("Status lock failed"),
	};
	match last_message {
		Some(message) => HttpResponse::Ok().body(message),
		None => HttpResponse::NotFound().body("Nothing published yet"),
	}
}

pub fn configure(cfg: &mut web::ServiceConfig) {
	cfg.service(get_status).service(get_last_message);
}

/// Starts the status server in the background on `bind`.
///
/// Signals are left to the caller so that Ctrl-C reaches the scheduler.
pub fn start(bind: &str, status: SharedStatus) -> io::Result<ServerHandle> {
	let data = web::Data::from(status);
	let server = HttpServer::new(move || App::new().app_data(data.clone()).configure(configure))
		.workers(1)
		.disable_signals()
		.bind(bind)?
		.run();

	let handle = server.handle();
	actix_web::rt::spawn(server);
	Ok(handle)
}
