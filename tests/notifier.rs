//! Отправка подтверждений через HTTP-релей.

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, NaiveTime};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use cinema_booking::error::AppError;
use cinema_booking::services::notification::{
    spawn_confirmation, BookingConfirmation, CircuitBreaker, CircuitState, MailRelayNotifier,
    Notifier, NotifyError,
};

fn confirmation() -> BookingConfirmation {
    BookingConfirmation {
        booking_id: 31,
        email: "marie@example.com".into(),
        name: "Marie".into(),
        movie_title: "Mickey 17".into(),
        date: NaiveDate::from_ymd_opt(2030, 6, 1).unwrap(),
        time: NaiveTime::from_hms_opt(19, 0, 0).unwrap(),
        room: "Salle 1".into(),
        seats: vec![8, 9],
        tickets: None,
        total_price: 6000,
    }
}

fn notifier(server: &MockServer, threshold: u32) -> MailRelayNotifier {
    MailRelayNotifier::new(
        format!("{}/send", server.uri()),
        Some("relay-key".into()),
        "noreply@example.com",
        Duration::from_secs(2),
        CircuitBreaker::new(threshold, Duration::from_secs(60)),
    )
    .unwrap()
}

#[tokio::test]
async fn confirmation_is_posted_to_relay() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/send"))
        .and(header("authorization", "Bearer relay-key"))
        .and(body_partial_json(serde_json::json!({
            "to": "marie@example.com",
            "from": "noreply@example.com",
            "subject": "Confirmation de réservation #31"
        })))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    notifier(&server, 3)
        .booking_confirmed(&confirmation())
        .await
        .unwrap();
}

#[tokio::test]
async fn repeated_failures_open_the_circuit() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&server)
        .await;

    let relay = notifier(&server, 2);
    for _ in 0..2 {
        let err = relay.booking_confirmed(&confirmation()).await.unwrap_err();
        assert!(matches!(err, NotifyError::Rejected(500)));
    }
    assert_eq!(relay.circuit_state(), CircuitState::Open);

    // Третий вызов до релея не доходит
    let err = relay.booking_confirmed(&confirmation()).await.unwrap_err();
    assert!(matches!(err, NotifyError::CircuitOpen));
}

#[tokio::test]
async fn failed_delivery_only_logs() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let relay: Arc<dyn Notifier> = Arc::new(notifier(&server, 5));
    spawn_confirmation(relay, 31, async { Ok::<_, AppError>(Some(confirmation())) })
        .await
        .unwrap();
}

#[tokio::test]
async fn opted_out_user_gets_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(202))
        .expect(0)
        .mount(&server)
        .await;

    let relay: Arc<dyn Notifier> = Arc::new(notifier(&server, 5));
    spawn_confirmation(relay.clone(), 31, async { Ok::<_, AppError>(None) })
        .await
        .unwrap();

    // Ошибка подготовки письма тоже не всплывает
    spawn_confirmation(relay, 32, async {
        Err::<Option<BookingConfirmation>, _>(AppError::not_found("booking", 32))
    })
    .await
    .unwrap();
}
