use axum::{
    Extension, Json,
    extract::{Path, State},
};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::entities::order::DrivingStatus;
use crate::entities::{child, emergency_contact, medical_info, order, road_child};
use crate::error::{AppError, AppResult};
use crate::utils::jwt::Claims;
use crate::utils::phone;

use super::auth::StatusResponse;

async fn owned_child(state: &AppState, parent_id: i32, child_id: i32) -> AppResult<child::Model> {
    child::Entity::find_by_id(child_id)
        .filter(child::Column::ParentId.eq(parent_id))
        .filter(child::Column::Active.eq(true))
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Ребёнок не найден".to_string()))
}

// ============ Children ============

#[derive(Debug, Deserialize)]
pub struct ChildRequest {
    pub surname: String,
    pub name: String,
    pub patronymic: Option<String>,
    pub birthday: Option<chrono::NaiveDate>,
    pub school_class: Option<String>,
    pub character_notes: Option<String>,
    pub photo: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChildResponse {
    pub status: bool,
    pub child: child::Model,
}

#[derive(Debug, Serialize)]
pub struct ChildrenResponse {
    pub status: bool,
    pub children: Vec<child::Model>,
}

/// Add a child to the parent's family
pub async fn add_child(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<ChildRequest>,
) -> AppResult<Json<ChildResponse>> {
    if payload.name.trim().is_empty() || payload.surname.trim().is_empty() {
        return Err(AppError::BadRequest(
            "Имя и фамилия обязательны".to_string(),
        ));
    }

    let created = child::ActiveModel {
        parent_id: Set(claims.sub),
        surname: Set(payload.surname),
        name: Set(payload.name),
        patronymic: Set(payload.patronymic),
        birthday: Set(payload.birthday),
        school_class: Set(payload.school_class),
        character_notes: Set(payload.character_notes),
        photo: Set(payload.photo),
        active: Set(true),
        ..Default::default()
    }
    .insert(&state.db)
    .await?;

    Ok(Json(ChildResponse {
        status: true,
        child: created,
    }))
}

/// List the parent's children
pub async fn list_children(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<Json<ChildrenResponse>> {
    let children = child::Entity::find()
        .filter(child::Column::ParentId.eq(claims.sub))
        .filter(child::Column::Active.eq(true))
        .order_by_asc(child::Column::Id)
        .all(&state.db)
        .await?;

    Ok(Json(ChildrenResponse {
        status: true,
        children,
    }))
}

/// Update a child's details
pub async fn update_child(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(child_id): Path<i32>,
    Json(payload): Json<ChildRequest>,
) -> AppResult<Json<ChildResponse>> {
    let found = owned_child(&state, claims.sub, child_id).await?;

    let mut active: child::ActiveModel = found.into();
    active.surname = Set(payload.surname);
    active.name = Set(payload.name);
    active.patronymic = Set(payload.patronymic);
    active.birthday = Set(payload.birthday);
    active.school_class = Set(payload.school_class);
    active.character_notes = Set(payload.character_notes);
    active.photo = Set(payload.photo);
    let updated = active.update(&state.db).await?;

    Ok(Json(ChildResponse {
        status: true,
        child: updated,
    }))
}

/// Remove a child (soft delete)
pub async fn delete_child(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(child_id): Path<i32>,
) -> AppResult<Json<StatusResponse>> {
    let found = owned_child(&state, claims.sub, child_id).await?;

    let mut active: child::ActiveModel = found.into();
    active.active = Set(false);
    active.update(&state.db).await?;

    Ok(Json(StatusResponse {
        status: true,
        message: "Ребёнок удалён".to_string(),
    }))
}

// ============ Emergency contacts ============

#[derive(Debug, Deserialize)]
pub struct ContactRequest {
    pub name: String,
    pub relationship: String,
    pub phone: String,
    pub priority: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct ContactResponse {
    pub status: bool,
    pub contact: emergency_contact::Model,
}

#[derive(Debug, Serialize)]
pub struct ContactsResponse {
    pub status: bool,
    pub contacts: Vec<emergency_contact::Model>,
}

/// Add an emergency contact to a child
pub async fn add_contact(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(child_id): Path<i32>,
    Json(payload): Json<ContactRequest>,
) -> AppResult<Json<ContactResponse>> {
    owned_child(&state, claims.sub, child_id).await?;

    let canonical = phone::normalize(&payload.phone)
        .ok_or_else(|| AppError::BadRequest("Некорректный номер телефона".to_string()))?;

    let created = emergency_contact::ActiveModel {
        child_id: Set(child_id),
        name: Set(payload.name),
        relationship: Set(payload.relationship),
        phone: Set(canonical),
        priority: Set(payload.priority.unwrap_or(1)),
        active: Set(true),
        ..Default::default()
    }
    .insert(&state.db)
    .await?;

    Ok(Json(ContactResponse {
        status: true,
        contact: created,
    }))
}

/// Emergency contacts of a child, priority order
pub async fn list_contacts(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(child_id): Path<i32>,
) -> AppResult<Json<ContactsResponse>> {
    owned_child(&state, claims.sub, child_id).await?;

    let contacts = emergency_contact::Entity::find()
        .filter(emergency_contact::Column::ChildId.eq(child_id))
        .filter(emergency_contact::Column::Active.eq(true))
        .order_by_asc(emergency_contact::Column::Priority)
        .all(&state.db)
        .await?;

    Ok(Json(ContactsResponse {
        status: true,
        contacts,
    }))
}

/// Remove an emergency contact
pub async fn delete_contact(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path((child_id, contact_id)): Path<(i32, i32)>,
) -> AppResult<Json<StatusResponse>> {
    owned_child(&state, claims.sub, child_id).await?;

    let found = emergency_contact::Entity::find_by_id(contact_id)
        .filter(emergency_contact::Column::ChildId.eq(child_id))
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Контакт не найден".to_string()))?;

    let mut active: emergency_contact::ActiveModel = found.into();
    active.active = Set(false);
    active.update(&state.db).await?;

    Ok(Json(StatusResponse {
        status: true,
        message: "Контакт удалён".to_string(),
    }))
}

// ============ Medical info ============

const BLOOD_TYPES: [&str; 8] = ["A+", "A-", "B+", "B-", "AB+", "AB-", "O+", "O-"];

fn validate_blood_type(raw: &str) -> AppResult<()> {
    if BLOOD_TYPES.contains(&raw) {
        Ok(())
    } else {
        Err(AppError::BadRequest(
            "Недопустимая группа крови".to_string(),
        ))
    }
}

/// Insurance policy numbers carry exactly 16 digits.
fn validate_policy_number(raw: &str) -> AppResult<()> {
    if raw.len() == 16 && raw.chars().all(|c| c.is_ascii_digit()) {
        Ok(())
    } else {
        Err(AppError::BadRequest(
            "Номер полиса должен состоять из 16 цифр".to_string(),
        ))
    }
}

#[derive(Debug, Deserialize)]
pub struct MedicalRequest {
    pub allergies: Option<String>,
    pub chronic_diseases: Option<String>,
    pub medications: Option<String>,
    pub blood_type: Option<String>,
    pub policy_number: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MedicalResponse {
    pub status: bool,
    pub medical: Option<medical_info::Model>,
}

/// Set or replace a child's medical card
pub async fn upsert_medical(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(child_id): Path<i32>,
    Json(payload): Json<MedicalRequest>,
) -> AppResult<Json<MedicalResponse>> {
    owned_child(&state, claims.sub, child_id).await?;

    if let Some(blood_type) = &payload.blood_type {
        validate_blood_type(blood_type)?;
    }
    if let Some(policy_number) = &payload.policy_number {
        validate_policy_number(policy_number)?;
    }

    let existing = medical_info::Entity::find()
        .filter(medical_info::Column::ChildId.eq(child_id))
        .filter(medical_info::Column::Active.eq(true))
        .one(&state.db)
        .await?;

    let saved = match existing {
        Some(row) => {
            let mut active: medical_info::ActiveModel = row.into();
            active.allergies = Set(payload.allergies);
            active.chronic_diseases = Set(payload.chronic_diseases);
            active.medications = Set(payload.medications);
            active.blood_type = Set(payload.blood_type);
            active.policy_number = Set(payload.policy_number);
            active.update(&state.db).await?
        }
        None => {
            medical_info::ActiveModel {
                child_id: Set(child_id),
                allergies: Set(payload.allergies),
                chronic_diseases: Set(payload.chronic_diseases),
                medications: Set(payload.medications),
                blood_type: Set(payload.blood_type),
                policy_number: Set(payload.policy_number),
                active: Set(true),
                ..Default::default()
            }
            .insert(&state.db)
            .await?
        }
    };

    Ok(Json(MedicalResponse {
        status: true,
        medical: Some(saved),
    }))
}

/// A child's medical card, parent view
pub async fn get_medical(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(child_id): Path<i32>,
) -> AppResult<Json<MedicalResponse>> {
    owned_child(&state, claims.sub, child_id).await?;

    let medical = medical_info::Entity::find()
        .filter(medical_info::Column::ChildId.eq(child_id))
        .filter(medical_info::Column::Active.eq(true))
        .one(&state.db)
        .await?;

    Ok(Json(MedicalResponse {
        status: true,
        medical,
    }))
}

/// Safety-relevant fields only; the policy number stays with the parent.
#[derive(Debug, Serialize)]
pub struct DriverMedicalView {
    pub allergies: Option<String>,
    pub chronic_diseases: Option<String>,
    pub medications: Option<String>,
    pub blood_type: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DriverMedicalResponse {
    pub status: bool,
    pub medical: Option<DriverMedicalView>,
}

/// Roads the driver's live trips cover. An order without a road attached
/// grants no medical access.
fn live_road_ids<I: IntoIterator<Item = Option<i32>>>(orders: I) -> Vec<i32> {
    orders.into_iter().flatten().collect()
}

/// Medical card as seen by the driver currently carrying the child
pub async fn driver_medical(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(child_id): Path<i32>,
) -> AppResult<Json<DriverMedicalResponse>> {
    // Visible only while the driver has a live trip and this child is
    // riding one of its roads.
    let live_orders = order::Entity::find()
        .filter(order::Column::DriverId.eq(claims.sub))
        .filter(order::Column::Active.eq(true))
        .filter(
            order::Column::StatusId.is_in([
                DrivingStatus::EnRoute,
                DrivingStatus::Arrived,
                DrivingStatus::InTrip,
            ]),
        )
        .all(&state.db)
        .await?;

    let road_ids = live_road_ids(live_orders.iter().map(|o| o.schedule_road_id));
    let child_is_riding = if road_ids.is_empty() {
        false
    } else {
        road_child::Entity::find()
            .filter(road_child::Column::RoadId.is_in(road_ids))
            .filter(road_child::Column::ChildId.eq(child_id))
            .filter(road_child::Column::Active.eq(true))
            .one(&state.db)
            .await?
            .is_some()
    };

    if !child_is_riding {
        return Err(AppError::Forbidden(
            "Медкарта доступна только во время поездки".to_string(),
        ));
    }

    let medical = medical_info::Entity::find()
        .filter(medical_info::Column::ChildId.eq(child_id))
        .filter(medical_info::Column::Active.eq(true))
        .one(&state.db)
        .await?
        .map(|m| DriverMedicalView {
            allergies: m.allergies,
            chronic_diseases: m.chronic_diseases,
            medications: m.medications,
            blood_type: m.blood_type,
        });

    Ok(Json(DriverMedicalResponse {
        status: true,
        medical,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_blood_types_accepted() {
        for bt in BLOOD_TYPES {
            assert!(validate_blood_type(bt).is_ok());
        }
        assert!(validate_blood_type("C+").is_err());
        assert!(validate_blood_type("ab+").is_err());
    }

    #[test]
    fn medical_access_needs_a_road_bound_trip() {
        // Live orders without roads expose nothing; the child check
        // never runs against an empty road set.
        assert!(live_road_ids([None, None]).is_empty());
        assert_eq!(live_road_ids([Some(3), None, Some(7)]), vec![3, 7]);
    }

    #[test]
    fn policy_number_must_be_sixteen_digits() {
        assert!(validate_policy_number("1234567890123456").is_ok());
        assert!(validate_policy_number("123456789012345").is_err());
        assert!(validate_policy_number("12345678901234567").is_err());
        assert!(validate_policy_number("123456789012345x").is_err());
    }
}
