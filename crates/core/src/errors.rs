use thiserror::Error;

pub const SERVICE_UNAVAILABLE_REPLY: &str =
    "Сервис временно недоступен. Пожалуйста, повторите попытку чуть позже.";
pub const ORDER_NOT_CONFIRMED_REPLY: &str = "Что-то пошло не так: ваш заказ мог не сохраниться. Пожалуйста, свяжитесь с нами или начните заново командой /start.";

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    /// Session state could not be read or written.
    #[error("persistence failure: {0}")]
    Persistence(String),
    /// A completed order did not reach its storage or the staff chat.
    #[error("integration failure: {0}")]
    Integration(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("order not confirmed: {message}")]
    OrderNotConfirmed { message: String, correlation_id: String },
}

impl InterfaceError {
    /// Customer-facing text; the bot talks Russian to its customers.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::ServiceUnavailable { .. } => SERVICE_UNAVAILABLE_REPLY,
            Self::OrderNotConfirmed { .. } => ORDER_NOT_CONFIRMED_REPLY,
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::ServiceUnavailable { correlation_id, .. }
            | Self::OrderNotConfirmed { correlation_id, .. } => correlation_id,
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        match self {
            Self::Persistence(message) => {
                InterfaceError::ServiceUnavailable { message, correlation_id }
            }
            Self::Integration(message) => {
                InterfaceError::OrderNotConfirmed { message, correlation_id }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::errors::{
        ApplicationError, InterfaceError, ORDER_NOT_CONFIRMED_REPLY, SERVICE_UNAVAILABLE_REPLY,
    };

    #[test]
    fn persistence_error_maps_to_service_unavailable() {
        let interface = ApplicationError::Persistence("database lock timeout".to_owned())
            .into_interface("upd-3");

        assert!(matches!(interface, InterfaceError::ServiceUnavailable { .. }));
        assert_eq!(interface.correlation_id(), "upd-3");
        assert_eq!(interface.user_message(), SERVICE_UNAVAILABLE_REPLY);
    }

    #[test]
    fn integration_error_tells_the_customer_to_get_in_touch() {
        let interface =
            ApplicationError::Integration("staff chat not found".to_owned()).into_interface("42");

        assert!(matches!(
            interface,
            InterfaceError::OrderNotConfirmed { ref message, .. } if message == "staff chat not found"
        ));
        assert_eq!(interface.user_message(), ORDER_NOT_CONFIRMED_REPLY);
        assert!(interface.user_message().contains("/start"));
    }
}
