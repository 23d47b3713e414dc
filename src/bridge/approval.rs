//! Approval hook consulted before every relayed signature.

use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;

use crate::types::UnsignedTransaction;

#[async_trait]
pub trait Approver: Send + Sync {
    async fn approve(&self, transaction: &UnsignedTransaction) -> bool;
}

/// Approves everything; the historical behaviour of the relay.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoApprove;

#[async_trait]
impl Approver for AutoApprove {
    async fn approve(&self, _: &UnsignedTransaction) -> bool {
        true
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DenyAll;

#[async_trait]
impl Approver for DenyAll {
    async fn approve(&self, _: &UnsignedTransaction) -> bool {
        false
    }
}

pub type ApproveFuture = Pin<Box<dyn Future<Output = bool> + Send>>;

/// Adapts an async closure, e.g. one that asks a UI surface for confirmation.
pub struct ApproveWith<F>(pub F);

#[async_trait]
impl<F> Approver for ApproveWith<F>
where
    F: Fn(UnsignedTransaction) -> ApproveFuture + Send + Sync,
{
    async fn approve(&self, transaction: &UnsignedTransaction) -> bool {
        (self.0)(transaction.clone()).await
    }
}
