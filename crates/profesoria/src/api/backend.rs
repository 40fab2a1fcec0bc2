//! The completion seam.
//!
//! [`CourseGenerator`](crate::service::CourseGenerator) never talks HTTP
//! directly. It hands a [`ChatRequest`] to a [`CompletionBackend`] and gets
//! a [`ChatCompletion`] back, which keeps the service testable with a
//! scripted backend.

use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;

use crate::error::Result;
use crate::{ChatCompletion, ChatRequest, OpenRouterClient};

/// Boxed future returned by [`CompletionBackend::complete`].
pub type CompletionFuture<'a> = BoxFuture<'a, Result<ChatCompletion>>;

/// Something that turns one chat request into one completion.
///
/// Implementations must not retry; every call is exactly one round trip.
pub trait CompletionBackend: Send + Sync {
    fn complete<'a>(&'a self, api_key: &'a str, request: &'a ChatRequest) -> CompletionFuture<'a>;
}

impl CompletionBackend for OpenRouterClient {
    fn complete<'a>(&'a self, api_key: &'a str, request: &'a ChatRequest) -> CompletionFuture<'a> {
        self.chat(api_key, request).boxed()
    }
}

impl<B: CompletionBackend + ?Sized> CompletionBackend for Arc<B> {
    fn complete<'a>(&'a self, api_key: &'a str, request: &'a ChatRequest) -> CompletionFuture<'a> {
        (**self).complete(api_key, request)
    }
}

impl<B: CompletionBackend + ?Sized> CompletionBackend for &B {
    fn complete<'a>(&'a self, api_key: &'a str, request: &'a ChatRequest) -> CompletionFuture<'a> {
        (**self).complete(api_key, request)
    }
}
