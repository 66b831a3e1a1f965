// src/services/notification_service.rs

use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{EmployeeRepository, NotificationRepository},
    models::{
        employee::{Employee, EmployeeStatus},
        notification::Notification,
    },
};

#[derive(Clone)]
pub struct NotificationService {
    repo: NotificationRepository,
    employee_repo: EmployeeRepository,
}

impl NotificationService {
    pub fn new(repo: NotificationRepository, employee_repo: EmployeeRepository) -> Self {
        Self { repo, employee_repo }
    }

    // Fan-out de um evento de negócio: N linhas, uma por funcionário
    // ativo do hospital, excluindo o autor do evento.
    pub async fn notify_hospital(
        &self,
        actor: &Employee,
        notification_type: &str,
        title: &str,
        message: &str,
        related_id: Option<Uuid>,
    ) -> Result<u64, AppError> {
        let recipients: Vec<Uuid> = self
            .employee_repo
            .list_by_hospital(actor.hospital_id)
            .await?
            .into_iter()
            .filter(|e| e.status == EmployeeStatus::Active && e.id != actor.id)
            .map(|e| e.id)
            .collect();

        if recipients.is_empty() {
            return Ok(0);
        }

        let inserted = self
            .repo
            .insert_for_recipients(
                &recipients,
                notification_type,
                actor.hospital_id,
                title,
                message,
                related_id,
            )
            .await?;

        tracing::info!(
            "📣 Anúncio '{}' entregue a {} destinatário(s)",
            title,
            inserted
        );
        Ok(inserted)
    }

    pub async fn list_mine(&self, employee: &Employee) -> Result<Vec<Notification>, AppError> {
        self.repo.list_for_user(employee.id).await
    }

    // Só o destinatário mexe no próprio is_read
    pub async fn mark_read(&self, employee: &Employee, id: Uuid) -> Result<(), AppError> {
        if self.repo.mark_read(id, employee.id).await? {
            Ok(())
        } else {
            Err(AppError::NotFound("Notificação"))
        }
    }

    pub async fn mark_all_read(&self, employee: &Employee) -> Result<u64, AppError> {
        self.repo.mark_all_read(employee.id).await
    }
}
