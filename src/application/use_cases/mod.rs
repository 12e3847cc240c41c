/// Use Cases - operations at the edge of the matching core
///
/// ## Available Use Cases
/// - `CreateOrderUseCase`: accepts a new request or offer and publishes its creation event
/// - `CompleteBookingUseCase`: completes a booking and publishes `BookingCompleted`

pub mod complete_booking;
pub mod create_order;

pub use complete_booking::CompleteBookingUseCase;
pub use create_order::CreateOrderUseCase;
