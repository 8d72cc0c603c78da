use axum::{
    routing::{delete, get, post},
    Router,
};

use crate::config::{create_cors_layer, create_security_headers_layer};
use crate::handlers::{bookings, events, health_check};
use crate::AppState;

pub fn create_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/events", post(events::create_event).get(events::list_events))
        .route("/events/my-events", get(events::list_my_events))
        .route("/events/my-registrations", get(events::list_my_registrations))
        .route(
            "/events/my-registrations/:event_id",
            delete(events::cancel_registration),
        )
        .route(
            "/events/:id",
            get(events::get_event)
                .put(events::update_event)
                .delete(events::delete_event),
        )
        .route("/events/:id/register", post(events::register_for_event))
        .route("/bookings/:id/confirm", post(bookings::confirm_booking))
        .layer(create_security_headers_layer())
        .layer(create_cors_layer())
        .with_state(state)
}
