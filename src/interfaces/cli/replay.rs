//! Newline-delimited JSON replay driver
//!
//! Each non-blank input line is one command, tagged by `type`:
//!
//! ```json
//! {"type":"RequestCreated","requestId":"r-1","passengerId":"p-1","airportCode":"PVG","vehicleType":"sedan","maxPrice":10.0,"preferHighRating":true,"desiredTime":"2024-05-01T10:00:00Z","status":"open"}
//! {"type":"OfferCreated","offerId":"o-1","driverId":"d-1","airportCode":"PVG","vehicleType":"sedan","availableFrom":"2024-05-01T09:00:00Z","availableTo":"2024-05-01T12:00:00Z","price":8.0,"rating":4.9,"status":"open"}
//! {"type":"CompleteBooking","bookingId":"booking-1"}
//! ```
//!
//! Creation commands go through [`CreateOrderUseCase`]; matching then
//! happens asynchronously on the bus. `CompleteBooking` first waits for the
//! bus to go idle so bookings created by earlier lines exist. Lines starting
//! with `#` are comments. A bad line is logged and skipped.

use crate::application::error::{RepositoryError, UseCaseError};
use crate::application::ports::OrderRepository;
use crate::application::use_cases::{CompleteBookingUseCase, CreateOrderUseCase};
use crate::domain::ids::BookingId;
use crate::infrastructure::eventbus::InMemoryEventBus;
use crate::shared::events::{OfferCreated, RequestCreated};
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum ReplayCommand {
    RequestCreated(RequestCreated),
    OfferCreated(OfferCreated),
    #[serde(rename_all = "camelCase")]
    CompleteBooking { booking_id: BookingId },
}

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("cannot read input: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("cannot serialize output: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayStats {
    pub commands: usize,
    pub rejected: usize,
    pub bookings: usize,
}

/// Parses one input line; `None` for blank and comment lines
pub fn parse_line(line: &str) -> Result<Option<ReplayCommand>, serde_json::Error> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    serde_json::from_str(line).map(Some)
}

pub struct Replayer<R> {
    create: CreateOrderUseCase<R, InMemoryEventBus>,
    complete: CompleteBookingUseCase<R, InMemoryEventBus>,
    bus: Arc<InMemoryEventBus>,
}

impl<R: OrderRepository> Replayer<R> {
    pub fn new(
        create: CreateOrderUseCase<R, InMemoryEventBus>,
        complete: CompleteBookingUseCase<R, InMemoryEventBus>,
        bus: Arc<InMemoryEventBus>,
    ) -> Self {
        Self { create, complete, bus }
    }

    pub async fn run<I>(&self, input: I) -> Result<ReplayStats, ReplayError>
    where
        I: AsyncBufRead + Unpin,
    {
        let mut stats = ReplayStats::default();
        let mut lines = input.lines();
        let mut line_no = 0usize;

        while let Some(line) = lines.next_line().await? {
            line_no += 1;
            let command = match parse_line(&line) {
                Ok(Some(command)) => command,
                Ok(None) => continue,
                Err(e) => {
                    warn!(line = line_no, error = %e, "skipping unparsable line");
                    stats.rejected += 1;
                    continue;
                }
            };
            stats.commands += 1;
            if let Err(e) = self.execute(command).await {
                warn!(line = line_no, error = %e, "command rejected");
                stats.rejected += 1;
            }
        }
        Ok(stats)
    }

    async fn execute(&self, command: ReplayCommand) -> Result<(), UseCaseError> {
        match command {
            ReplayCommand::RequestCreated(payload) => {
                let request = self.create.submit_request(payload).await?;
                debug!(request_id = %request.id, "request submitted");
            }
            ReplayCommand::OfferCreated(payload) => {
                let offer = self.create.submit_offer(payload).await?;
                debug!(offer_id = %offer.id, "offer submitted");
            }
            ReplayCommand::CompleteBooking { booking_id } => {
                self.bus.wait_idle().await;
                self.complete.execute(&booking_id).await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::persistence::InMemoryOrderRepository;

    #[test]
    fn test_parse_skips_blank_and_comments() {
        assert_eq!(parse_line("").unwrap(), None);
        assert_eq!(parse_line("   ").unwrap(), None);
        assert_eq!(parse_line("# seed data").unwrap(), None);
    }

    #[test]
    fn test_parse_complete_booking() {
        let command = parse_line(r#"{"type":"CompleteBooking","bookingId":"booking-1"}"#).unwrap();
        assert_eq!(
            command,
            Some(ReplayCommand::CompleteBooking {
                booking_id: BookingId::new("booking-1")
            })
        );
    }

    #[test]
    fn test_parse_rejects_unknown_type() {
        assert!(parse_line(r#"{"type":"Matched","bookingId":"b"}"#).is_err());
    }

    #[tokio::test]
    async fn test_run_counts_commands_and_rejections() {
        let repo = Arc::new(InMemoryOrderRepository::new());
        let bus = Arc::new(InMemoryEventBus::new());
        let replayer = Replayer::new(
            CreateOrderUseCase::new(repo.clone(), bus.clone()),
            CompleteBookingUseCase::new(repo.clone(), bus.clone()),
            bus.clone(),
        );

        let input = concat!(
            "# two requests from the same passenger, one garbage line\n",
            r#"{"type":"RequestCreated","requestId":"r-1","passengerId":"p-1","airportCode":"PVG","vehicleType":"sedan","maxPrice":10.0,"preferHighRating":true,"desiredTime":"2024-05-01T10:00:00Z","status":"open"}"#,
            "\n",
            r#"{"type":"RequestCreated","requestId":"r-2","passengerId":"p-1","airportCode":"PVG","vehicleType":"sedan","maxPrice":10.0,"preferHighRating":true,"desiredTime":"2024-05-01T11:00:00Z","status":"open"}"#,
            "\n",
            "not json\n",
        );

        let stats = replayer.run(input.as_bytes()).await.unwrap();
        assert_eq!(stats.commands, 2);
        assert_eq!(stats.rejected, 2);
        assert_eq!(bus.published().len(), 1);
    }
}
