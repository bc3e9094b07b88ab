use axum::{
    Router, middleware,
    routing::{delete, get, post, put},
};

use crate::AppState;
use crate::handlers::{auth, chat, family, matching, payments, safety, schedule};
use crate::middleware::auth::{
    auth_middleware, require_driver, require_parent, require_staff,
};
use crate::middleware::rate_limit::create_global_governor;

pub fn create_router(state: AppState) -> Router {
    let public_governor = create_global_governor();

    // No credentials: registration, login, provider callbacks and the
    // chat socket, which authenticates with its own token.
    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .layer(public_governor.clone());

    let webhook_routes = Router::new()
        .route(
            "/payments_status/{order_key}",
            post(payments::payments_status_webhook),
        )
        .route("/payout_result", post(payments::payout_result))
        .layer(public_governor.clone());

    let ws_routes = Router::new()
        .route("/ws/{token}", get(chat::ws_connect))
        .layer(public_governor);

    // Any authenticated role: profile, notifications, chat, cards,
    // balance and the SOS button.
    let common_routes = Router::new()
        .route("/auth/me", get(auth::me))
        .route("/auth/me", put(auth::update_me))
        .route("/auth/push_token", post(auth::register_push_token))
        .route("/auth/notifications", get(auth::notifications))
        .route("/chats", get(chat::list_chats))
        .route("/chats/connect_token", post(chat::connect_token))
        .route("/chats/{chat_id}/messages", get(chat::chat_history))
        .route("/cards", post(payments::add_card))
        .route("/cards", get(payments::list_cards))
        .route("/cards/{card_id}", delete(payments::delete_card))
        .route("/balance/history", get(payments::balance_history))
        .route("/sos", post(safety::activate_sos))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let parent_routes = Router::new()
        .route("/schedules", post(schedule::create_schedule))
        .route("/schedules", get(schedule::list_schedules))
        .route("/schedules/{id}", get(schedule::get_schedule))
        .route("/schedules/{id}", put(schedule::update_schedule))
        .route("/schedules/{id}", delete(schedule::delete_schedule))
        .route(
            "/schedules/{id}/cancel",
            post(schedule::cancel_schedule_with_debit),
        )
        .route("/schedules/{id}/roads", post(schedule::add_road))
        .route("/schedules/{id}/responses", get(matching::schedule_responses))
        .route(
            "/schedules/responses/answer",
            post(matching::answer_schedule_responses),
        )
        .route("/roads", put(schedule::update_road))
        .route("/roads/{id}", delete(schedule::delete_road))
        .route("/children", post(family::add_child))
        .route("/children", get(family::list_children))
        .route("/children/{id}", put(family::update_child))
        .route("/children/{id}", delete(family::delete_child))
        .route("/children/{id}/contacts", post(family::add_contact))
        .route("/children/{id}/contacts", get(family::list_contacts))
        .route(
            "/children/{id}/contacts/{contact_id}",
            delete(family::delete_contact),
        )
        .route("/children/{id}/medical", post(family::upsert_medical))
        .route("/children/{id}/medical", get(family::get_medical))
        .route("/payments", post(payments::start_payment))
        .route("/payments/sbp", post(payments::start_sbp_payment))
        .route("/payments/confirm", post(payments::confirm_payment))
        .route("/payments/add_money", post(payments::add_money))
        .route("/meeting_code/verify", post(safety::verify_meeting_code))
        .layer(middleware::from_fn(require_parent))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let driver_routes = Router::new()
        .route("/schedules/open", get(matching::open_schedules))
        .route("/schedules/bid", post(matching::want_schedule_requests))
        .route("/meeting_code", post(safety::generate_meeting_code))
        .route("/orders/status", post(safety::update_order_status))
        .route("/roads/{id}/children", get(safety::road_children))
        .route("/children/{id}/medical", get(family::driver_medical))
        .route("/payout", post(payments::payout_request))
        .layer(middleware::from_fn(require_driver))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let staff_routes = Router::new()
        .route("/users/deactivate", post(auth::deactivate_user))
        .route("/sos/{id}/resolve", post(safety::resolve_sos))
        .layer(middleware::from_fn(require_staff))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api/payments", webhook_routes)
        .nest("/api/chats", ws_routes)
        .nest("/api", common_routes)
        .nest("/api/parent", parent_routes)
        .nest("/api/driver", driver_routes)
        .nest("/api/admin", staff_routes)
        .with_state(state)
}
