mod order_kind;
mod order_state;
mod side;
mod time_in_force;

pub use order_kind::OrderKind;
pub use order_state::OrderState;
pub use side::Side;
pub use time_in_force::TimeInForce;
