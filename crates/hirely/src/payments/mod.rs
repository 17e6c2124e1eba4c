//! Payment gateway integration: signed webhooks that activate listings and hosted
//! checkout sessions that start the payment.

pub mod checkout;
pub mod signature;
pub mod webhook;


pub use checkout::{
    checkout_router, CheckoutError, CheckoutGateway, CheckoutRequest, CheckoutService,
    CheckoutSession, PaymentGatewayError, StripeCheckoutGateway,
};
pub use signature::{SignatureError, WebhookVerifier, SIGNATURE_HEADER};
pub use webhook::{webhook_router, WebhookState, CHECKOUT_COMPLETED};
