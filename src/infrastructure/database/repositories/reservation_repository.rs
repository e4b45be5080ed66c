//! SeaORM implementation of ReservationRepository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use tracing::debug;
use uuid::Uuid;

use crate::domain::reservation::{
    CredentialState, Reservation, ReservationRepository, ReservationStatus, TransitionRecord,
};
use crate::domain::{DomainError, DomainResult, TimeWindow};
use crate::infrastructure::database::entities::{reservation, reservation_transition};

pub struct SeaOrmReservationRepository {
    db: DatabaseConnection,
}

impl SeaOrmReservationRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

// ── Conversion helpers ──────────────────────────────────────────

fn model_to_domain(m: reservation::Model) -> DomainResult<Reservation> {
    let id = Uuid::parse_str(&m.id)
        .map_err(|e| DomainError::DataIntegrity(format!("reservation id {}: {}", m.id, e)))?;
    let status = ReservationStatus::parse(&m.status).ok_or_else(|| {
        DomainError::DataIntegrity(format!("reservation {}: unknown status {}", m.id, m.status))
    })?;
    let credential = CredentialState::parse(&m.credential_state).ok_or_else(|| {
        DomainError::DataIntegrity(format!(
            "reservation {}: unknown credential state {}",
            m.id, m.credential_state
        ))
    })?;
    let window = TimeWindow::new(m.window_start, m.window_end)
        .map_err(|e| DomainError::DataIntegrity(format!("reservation {}: {}", m.id, e)))?;

    Ok(Reservation {
        id,
        user_id: m.user_id,
        vehicle_id: m.vehicle_id,
        station_id: m.station_id,
        connector_id: m.connector_id,
        window,
        status,
        payment_deadline: m.payment_deadline,
        is_paid: m.is_paid,
        estimated_cost: m.estimated_cost,
        actual_cost: m.actual_cost,
        currency: m.currency,
        access_token_hash: m.access_token_hash,
        credential,
        payment_ref: m.payment_ref,
        checked_in_at: m.checked_in_at,
        charging_started_at: m.charging_started_at,
        created_at: m.created_at,
        updated_at: m.updated_at,
    })
}

fn domain_to_active(r: &Reservation) -> reservation::ActiveModel {
    reservation::ActiveModel {
        id: Set(r.id.to_string()),
        user_id: Set(r.user_id.clone()),
        vehicle_id: Set(r.vehicle_id.clone()),
        station_id: Set(r.station_id.clone()),
        connector_id: Set(r.connector_id.clone()),
        window_start: Set(r.window.start()),
        window_end: Set(r.window.end()),
        status: Set(r.status.as_str().to_string()),
        payment_deadline: Set(r.payment_deadline),
        is_paid: Set(r.is_paid),
        estimated_cost: Set(r.estimated_cost),
        actual_cost: Set(r.actual_cost),
        currency: Set(r.currency.clone()),
        access_token_hash: Set(r.access_token_hash.clone()),
        credential_state: Set(r.credential.as_str().to_string()),
        payment_ref: Set(r.payment_ref.clone()),
        checked_in_at: Set(r.checked_in_at),
        charging_started_at: Set(r.charging_started_at),
        created_at: Set(r.created_at),
        updated_at: Set(r.updated_at),
    }
}

fn record_to_active(id: Uuid, record: &TransitionRecord) -> reservation_transition::ActiveModel {
    reservation_transition::ActiveModel {
        id: NotSet,
        reservation_id: Set(id.to_string()),
        status: Set(record.status.as_str().to_string()),
        note: Set(record.note.clone()),
        occurred_at: Set(record.at),
    }
}

fn models_to_domain(models: Vec<reservation::Model>) -> DomainResult<Vec<Reservation>> {
    models.into_iter().map(model_to_domain).collect()
}

fn occupying_statuses() -> Vec<&'static str> {
    ReservationStatus::OCCUPYING.iter().map(|s| s.as_str()).collect()
}

fn db_err(e: sea_orm::DbErr) -> DomainError {
    DomainError::StoreUnavailable(format!("Database error: {}", e))
}

async fn overlapping<C: ConnectionTrait>(
    conn: &C,
    connector_id: &str,
    window: &TimeWindow,
) -> DomainResult<Vec<reservation::Model>> {
    reservation::Entity::find()
        .filter(reservation::Column::ConnectorId.eq(connector_id))
        .filter(reservation::Column::Status.is_in(occupying_statuses()))
        .filter(reservation::Column::WindowStart.lt(window.end()))
        .filter(reservation::Column::WindowEnd.gt(window.start()))
        .order_by_asc(reservation::Column::WindowStart)
        .all(conn)
        .await
        .map_err(db_err)
}

// ── ReservationRepository impl ──────────────────────────────────

#[async_trait]
impl ReservationRepository for SeaOrmReservationRepository {
    async fn insert_if_free(
        &self,
        r: &Reservation,
        initial: &TransitionRecord,
    ) -> DomainResult<()> {
        debug!(reservation_id = %r.id, connector_id = %r.connector_id, "Inserting reservation");

        let txn = self.db.begin().await.map_err(db_err)?;

        let conflicts = overlapping(&txn, &r.connector_id, &r.window).await?;
        if !conflicts.is_empty() {
            // Dropping the transaction rolls it back
            return Err(DomainError::SlotUnavailable {
                connector_id: r.connector_id.clone(),
                conflicts: conflicts
                    .into_iter()
                    .filter_map(|m| Uuid::parse_str(&m.id).ok())
                    .collect(),
            });
        }

        domain_to_active(r).insert(&txn).await.map_err(db_err)?;
        record_to_active(r.id, initial)
            .insert(&txn)
            .await
            .map_err(db_err)?;

        txn.commit().await.map_err(db_err)
    }

    async fn compare_and_set(
        &self,
        updated: &Reservation,
        expected: ReservationStatus,
        record: Option<&TransitionRecord>,
    ) -> DomainResult<()> {
        let txn = self.db.begin().await.map_err(db_err)?;

        let mut changes = domain_to_active(updated);
        changes.id = NotSet;

        let result = reservation::Entity::update_many()
            .set(changes)
            .filter(reservation::Column::Id.eq(updated.id.to_string()))
            .filter(reservation::Column::Status.eq(expected.as_str()))
            .exec(&txn)
            .await
            .map_err(db_err)?;

        if result.rows_affected == 0 {
            let current = reservation::Entity::find_by_id(updated.id.to_string())
                .one(&txn)
                .await
                .map_err(db_err)?;

            return match current {
                None => Err(DomainError::reservation_not_found(updated.id)),
                Some(m) => Err(DomainError::StatusConflict {
                    reservation_id: updated.id,
                    expected,
                    actual: ReservationStatus::parse(&m.status).ok_or_else(|| {
                        DomainError::DataIntegrity(format!("unknown status {}", m.status))
                    })?,
                }),
            };
        }

        if let Some(record) = record {
            record_to_active(updated.id, record)
                .insert(&txn)
                .await
                .map_err(db_err)?;
        }

        txn.commit().await.map_err(db_err)?;
        debug!(
            reservation_id = %updated.id,
            from = %expected,
            to = %updated.status,
            "Reservation updated"
        );
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> DomainResult<Option<Reservation>> {
        reservation::Entity::find_by_id(id.to_string())
            .one(&self.db)
            .await
            .map_err(db_err)?
            .map(model_to_domain)
            .transpose()
    }

    async fn find_by_token_hash(&self, token_hash: &str) -> DomainResult<Option<Reservation>> {
        reservation::Entity::find()
            .filter(reservation::Column::AccessTokenHash.eq(token_hash))
            .one(&self.db)
            .await
            .map_err(db_err)?
            .map(model_to_domain)
            .transpose()
    }

    async fn find_overlapping(
        &self,
        connector_id: &str,
        window: &TimeWindow,
    ) -> DomainResult<Vec<Reservation>> {
        models_to_domain(overlapping(&self.db, connector_id, window).await?)
    }

    async fn find_occupying(&self) -> DomainResult<Vec<Reservation>> {
        let models = reservation::Entity::find()
            .filter(reservation::Column::Status.is_in(occupying_statuses()))
            .order_by_asc(reservation::Column::ConnectorId)
            .order_by_asc(reservation::Column::WindowStart)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        models_to_domain(models)
    }

    async fn find_overdue_pending(&self, now: DateTime<Utc>) -> DomainResult<Vec<Reservation>> {
        let models = reservation::Entity::find()
            .filter(reservation::Column::Status.eq(ReservationStatus::Pending.as_str()))
            .filter(reservation::Column::IsPaid.eq(false))
            .filter(reservation::Column::PaymentDeadline.lte(now))
            .order_by_asc(reservation::Column::PaymentDeadline)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        models_to_domain(models)
    }

    async fn find_unstarted_check_ins(
        &self,
        checked_in_before: DateTime<Utc>,
    ) -> DomainResult<Vec<Reservation>> {
        let models = reservation::Entity::find()
            .filter(reservation::Column::Status.eq(ReservationStatus::CheckedIn.as_str()))
            .filter(reservation::Column::ChargingStartedAt.is_null())
            .filter(reservation::Column::CheckedInAt.lte(checked_in_before))
            .all(&self.db)
            .await
            .map_err(db_err)?;
        models_to_domain(models)
    }

    async fn find_for_user(&self, user_id: &str) -> DomainResult<Vec<Reservation>> {
        let models = reservation::Entity::find()
            .filter(reservation::Column::UserId.eq(user_id))
            .order_by_desc(reservation::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        models_to_domain(models)
    }

    async fn transition_log(&self, id: Uuid) -> DomainResult<Vec<TransitionRecord>> {
        let models = reservation_transition::Entity::find()
            .filter(reservation_transition::Column::ReservationId.eq(id.to_string()))
            .order_by_asc(reservation_transition::Column::Id)
            .all(&self.db)
            .await
            .map_err(db_err)?;

        models
            .into_iter()
            .map(|m| {
                let status = ReservationStatus::parse(&m.status).ok_or_else(|| {
                    DomainError::DataIntegrity(format!("transition {}: unknown status {}", m.id, m.status))
                })?;
                Ok(TransitionRecord::new(status, m.occurred_at, m.note))
            })
            .collect()
    }
}
