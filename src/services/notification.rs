//! Подтверждения бронирования.
//!
//! Отправка идёт в фоне уже после фиксации брони: ошибка почтового релея
//! только логируется и на бронь не влияет. Вызовы релея защищены
//! автоматическим выключателем (Circuit Breaker).

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use chrono::{NaiveDate, NaiveTime};
use futures::future::BoxFuture;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::{CircuitBreakerConfig, NotificationConfig};
use crate::error::AppResult;
use crate::models::Tickets;
use crate::services::pricing::CURRENCY;

/// Состояния выключателя.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Запросы к релею разрешены.
    Closed,
    /// Релей недоступен, запросы блокируются до истечения таймаута.
    Open,
    /// Таймаут истёк, пропускаем пробный запрос.
    HalfOpen,
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    failures: u32,
    opened_at: Option<Instant>,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    inner: Mutex<BreakerInner>,
    failure_threshold: u32,
    timeout: Duration,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, timeout: Duration) -> Self {
        Self {
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                failures: 0,
                opened_at: None,
            }),
            failure_threshold: failure_threshold.max(1),
            timeout,
        }
    }

    pub fn from_config(config: &CircuitBreakerConfig) -> Self {
        Self::new(config.failure_threshold, Duration::from_secs(config.timeout_seconds))
    }

    pub fn can_execute(&self) -> bool {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        match inner.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let expired = inner
                    .opened_at
                    .map_or(true, |at| at.elapsed() >= self.timeout);
                if expired {
                    inner.state = CircuitState::HalfOpen;
                    info!("Circuit breaker transitioning to HalfOpen state");
                }
                expired
            }
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if inner.state == CircuitState::HalfOpen {
            info!("Circuit breaker recovered - transitioning to Closed state");
        }
        inner.state = CircuitState::Closed;
        inner.failures = 0;
        inner.opened_at = None;
    }

    pub fn record_failure(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.failures = inner.failures.saturating_add(1);
        match inner.state {
            CircuitState::Closed if inner.failures >= self.failure_threshold => {
                inner.state = CircuitState::Open;
                inner.opened_at = Some(Instant::now());
                error!(
                    failures = inner.failures,
                    threshold = self.failure_threshold,
                    "Circuit breaker OPENED"
                );
            }
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Open;
                inner.opened_at = Some(Instant::now());
                warn!("Circuit breaker test failed - returning to Open state");
            }
            _ => {}
        }
    }

    pub fn state(&self) -> CircuitState {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).state
    }
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("circuit breaker is open - mail relay temporarily unavailable")]
    CircuitOpen,
    #[error("mail relay request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("mail relay rejected message with status {0}")]
    Rejected(u16),
}

/// Данные для письма-подтверждения.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BookingConfirmation {
    pub booking_id: i64,
    pub email: String,
    pub name: String,
    pub movie_title: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub room: String,
    pub seats: Vec<i32>,
    pub tickets: Option<Tickets>,
    pub total_price: i64,
}

impl BookingConfirmation {
    pub fn subject(&self) -> String {
        format!("Confirmation de réservation #{}", self.booking_id)
    }

    pub fn text(&self) -> String {
        let seats = self
            .seats
            .iter()
            .map(i32::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "Bonjour {},\n\n{} - {} {} - {}\nPlaces : {}\nTotal : {} {}\n",
            self.name,
            self.movie_title,
            self.date.format("%d/%m/%Y"),
            self.time.format("%H:%M"),
            self.room,
            seats,
            self.total_price,
            CURRENCY
        )
    }
}

pub trait Notifier: Send + Sync {
    fn booking_confirmed<'a>(
        &'a self,
        confirmation: &'a BookingConfirmation,
    ) -> BoxFuture<'a, Result<(), NotifyError>>;
}

/// Используется, когда релей не настроен: письмо только пишется в лог.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn booking_confirmed<'a>(
        &'a self,
        confirmation: &'a BookingConfirmation,
    ) -> BoxFuture<'a, Result<(), NotifyError>> {
        Box::pin(async move {
            info!(
                booking_id = confirmation.booking_id,
                to = %confirmation.email,
                subject = %confirmation.subject(),
                "confirmation email (log only)"
            );
            Ok(())
        })
    }
}

#[derive(Debug, Serialize)]
struct RelayMessage<'a> {
    from: &'a str,
    to: &'a str,
    subject: String,
    text: String,
}

/// Отправка писем через HTTP-релей.
pub struct MailRelayNotifier {
    http_client: reqwest::Client,
    relay_url: String,
    api_key: Option<String>,
    sender: String,
    circuit_breaker: CircuitBreaker,
}

impl MailRelayNotifier {
    pub fn new(
        relay_url: impl Into<String>,
        api_key: Option<String>,
        sender: impl Into<String>,
        timeout: Duration,
        circuit_breaker: CircuitBreaker,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self {
            http_client: reqwest::Client::builder().timeout(timeout).build()?,
            relay_url: relay_url.into(),
            api_key,
            sender: sender.into(),
            circuit_breaker,
        })
    }

    pub fn circuit_state(&self) -> CircuitState {
        self.circuit_breaker.state()
    }

    async fn send(&self, confirmation: &BookingConfirmation) -> Result<(), NotifyError> {
        if !self.circuit_breaker.can_execute() {
            warn!("Circuit breaker is OPEN - skipping mail relay request");
            return Err(NotifyError::CircuitOpen);
        }

        let message = RelayMessage {
            from: &self.sender,
            to: &confirmation.email,
            subject: confirmation.subject(),
            text: confirmation.text(),
        };
        let mut request = self.http_client.post(&self.relay_url).json(&message);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let result = match request.send().await {
            Ok(response) if response.status().is_success() => Ok(()),
            Ok(response) => Err(NotifyError::Rejected(response.status().as_u16())),
            Err(e) => Err(NotifyError::Transport(e)),
        };

        match &result {
            Ok(()) => self.circuit_breaker.record_success(),
            Err(e) => {
                error!(error = %e, "mail relay request failed");
                self.circuit_breaker.record_failure();
            }
        }
        result
    }
}

impl Notifier for MailRelayNotifier {
    fn booking_confirmed<'a>(
        &'a self,
        confirmation: &'a BookingConfirmation,
    ) -> BoxFuture<'a, Result<(), NotifyError>> {
        Box::pin(self.send(confirmation))
    }
}

/// Выбирает реализацию по конфигурации.
pub fn build_notifier(
    config: &NotificationConfig,
    breaker: &CircuitBreakerConfig,
) -> Arc<dyn Notifier> {
    let Some(relay_url) = &config.relay_url else {
        info!("MAIL_RELAY_URL not set, confirmations will only be logged");
        return Arc::new(LogNotifier);
    };

    match MailRelayNotifier::new(
        relay_url.clone(),
        config.api_key.clone(),
        config.sender.clone(),
        Duration::from_secs(config.timeout_seconds),
        CircuitBreaker::from_config(breaker),
    ) {
        Ok(notifier) => Arc::new(notifier),
        Err(e) => {
            error!(error = %e, "failed to build mail relay client, falling back to log notifier");
            Arc::new(LogNotifier)
        }
    }
}

/// Готовит и отправляет подтверждение в отдельной задаче.
///
/// `load` возвращает `None`, если письмо слать не нужно (пользователь отключил
/// уведомления). Любая ошибка здесь только логируется.
pub fn spawn_confirmation<F>(notifier: Arc<dyn Notifier>, booking_id: i64, load: F) -> JoinHandle<()>
where
    F: Future<Output = AppResult<Option<BookingConfirmation>>> + Send + 'static,
{
    tokio::spawn(async move {
        let confirmation = match load.await {
            Ok(Some(confirmation)) => confirmation,
            Ok(None) => {
                debug!(booking_id, "email notifications disabled, skipping confirmation");
                return;
            }
            Err(e) => {
                warn!(booking_id, error = %e, "could not prepare booking confirmation");
                return;
            }
        };

        match notifier.booking_confirmed(&confirmation).await {
            Ok(()) => debug!(booking_id, "booking confirmation sent"),
            Err(e) => warn!(booking_id, error = %e, "booking confirmation not delivered"),
        }
    })
}
