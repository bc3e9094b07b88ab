pub mod balance_account;
pub mod balance_history;
pub mod card;
pub mod chat;
pub mod chat_notification;
pub mod chat_participant;
pub mod chat_participant_token;
pub mod child;
pub mod driver_bid;
pub mod emergency_contact;
pub mod franchise;
pub mod lease;
pub mod medical_info;
pub mod meeting_code;
pub mod message;
pub mod notification;
pub mod order;
pub mod order_address;
pub mod order_info;
pub mod order_other_parameter;
pub mod other_parameter;
pub mod payment;
pub mod pricing_coefficients;
pub mod push_token;
pub mod road_address;
pub mod road_child;
pub mod road_contact;
pub mod road_driver;
pub mod schedule;
pub mod schedule_other_parameter;
pub mod schedule_road;
pub mod sos_event;
pub mod tariff;
pub mod user;
pub mod user_role;
pub mod weekly_payment_history;
pub mod weekly_payment_schedule;
