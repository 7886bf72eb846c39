mod amqp;
pub use amqp::AmqpBroker;
