//! WebSocket endpoint streaming live device updates to observers.

use actix_web::{get, web, HttpRequest, HttpResponse};
use actix_ws::Message;
use log::{error, info, warn};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::services::fanout::{DeviceUpdate, UpdateBroadcaster, DEVICE_UPDATE_EVENT};

/// Frame sent to observers: the update tagged with its event name.
#[derive(Serialize)]
struct EventFrame<'a> {
    event: &'static str,
    #[serde(flatten)]
    update: &'a DeviceUpdate,
}

/// Upgrade the connection and forward every broadcast update as a JSON text
/// frame. No replay for late joiners; a lagging observer silently skips the
/// updates it missed.
#[get("/ws")]
pub async fn device_updates(
    req: HttpRequest,
    body: web::Payload,
    broadcaster: web::Data<UpdateBroadcaster>,
) -> Result<HttpResponse, actix_web::Error> {
    let (response, mut session, mut msg_stream) = actix_ws::handle(&req, body)?;
    let mut updates = broadcaster.subscribe();

    info!("Observer connected");

    actix_web::rt::spawn(async move {
        let close_reason = loop {
            tokio::select! {
                update = updates.recv() => match update {
                    Ok(update) => {
                        let frame = EventFrame {
                            event: DEVICE_UPDATE_EVENT,
                            update: &update,
                        };
                        let text = match serde_json::to_string(&frame) {
                            Ok(text) => text,
                            Err(e) => {
                                error!("Failed to serialize device update: {}", e);
                                continue;
                            }
                        };
                        if session.text(text).await.is_err() {
                            break None;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Observer lagging, {} updates dropped", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break None,
                },
                msg = msg_stream.recv() => match msg {
                    Some(Ok(Message::Ping(bytes))) => {
                        if session.pong(&bytes).await.is_err() {
                            break None;
                        }
                    }
                    Some(Ok(Message::Close(reason))) => break reason,
                    Some(Ok(_)) => {}
                    Some(Err(_)) | None => break None,
                },
            }
        };

        let _ = session.close(close_reason).await;
        info!("Observer disconnected");
    });

    Ok(response)
}
