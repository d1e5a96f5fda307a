//! Typed batching over Multicall3 `tryAggregate`.
//!
//! Every logical call pushed into a [`BatchBuilder`] yields a [`Handle`]
//! carrying its slot index and the call type, so results are always decoded
//! with the ABI of the call that produced them and slot positions never need
//! to be computed by hand.

use std::{fmt, marker::PhantomData};

use alloy_primitives::{Address, Bytes};
use alloy_sol_types::SolCall;
use log::debug;
use thiserror::Error;

use crate::{
    contracts::IMulticall3::{self, CallResult},
    rpc_client::{EthCall, RpcError},
};

/// Why a single sub-call produced no value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallDecodeError {
    #[error("call reverted")]
    Reverted,
    #[error("call returned no data")]
    EmptyReturn,
    #[error("abi decoding failed: {0}")]
    Abi(String),
    #[error("no result for slot {0}")]
    MissingSlot(usize),
}

#[derive(Debug, Error)]
pub enum MulticallError {
    #[error(transparent)]
    Rpc(#[from] RpcError),
    #[error("Malformed tryAggregate output: {0}")]
    Decode(String),
    #[error("tryAggregate returned {got} results for {expected} calls")]
    LengthMismatch { expected: usize, got: usize },
}

/// Typed position of a call inside a batch
pub struct Handle<C> {
    index: usize,
    _call: PhantomData<fn() -> C>,
}

impl<C> Handle<C> {
    pub fn index(&self) -> usize {
        self.index
    }
}

impl<C> Clone for Handle<C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C> Copy for Handle<C> {}

impl<C> fmt::Debug for Handle<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Handle").field(&self.index).finish()
    }
}

pub struct BatchBuilder {
    // Target of placeholder slots
    placeholder: Address,
    calls: Vec<IMulticall3::Call>,
}

impl BatchBuilder {
    pub fn new(placeholder: Address) -> Self {
        Self::with_capacity(placeholder, 0)
    }

    pub fn with_capacity(placeholder: Address, capacity: usize) -> Self {
        Self {
            placeholder,
            calls: Vec::with_capacity(capacity),
        }
    }

    pub fn push<C: SolCall>(&mut self, target: Address, call: &C) -> Handle<C> {
        self.push_raw(target, Bytes::from(call.abi_encode()))
    }

    /// Reserve a slot without a meaningful call.
    ///
    /// The slot carries empty calldata to the placeholder target, its result
    /// always decodes to an error.
    pub fn push_placeholder<C: SolCall>(&mut self) -> Handle<C> {
        self.push_raw(self.placeholder, Bytes::new())
    }

    fn push_raw<C>(&mut self, target: Address, call_data: Bytes) -> Handle<C> {
        let index = self.calls.len();
        self.calls.push(IMulticall3::Call {
            target,
            callData: call_data,
        });
        Handle {
            index,
            _call: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }
}

/// Per-slot outcomes of one aggregated call
#[derive(Clone, Default)]
pub struct BatchResults {
    results: Vec<CallResult>,
}

impl BatchResults {
    pub fn from_results(results: Vec<CallResult>) -> Self {
        Self { results }
    }

    pub fn decode<C: SolCall>(&self, handle: &Handle<C>) -> Result<C::Return, CallDecodeError> {
        let result = self
            .results
            .get(handle.index)
            .ok_or(CallDecodeError::MissingSlot(handle.index))?;

        if !result.success {
            return Err(CallDecodeError::Reverted);
        }
        if result.returnData.is_empty() {
            return Err(CallDecodeError::EmptyReturn);
        }

        C::abi_decode_returns(&result.returnData, true)
            .map_err(|e| CallDecodeError::Abi(e.to_string()))
    }
}

/// Multicall3 deployment reached through an [`EthCall`] transport
pub struct Multicall<'a, T: EthCall + ?Sized> {
    client: &'a T,
    address: Address,
}

impl<'a, T: EthCall + ?Sized> Multicall<'a, T> {
    pub fn new(client: &'a T, address: Address) -> Self {
        Self { client, address }
    }

    /// Start an empty batch whose placeholders target this deployment
    pub fn batch(&self, capacity: usize) -> BatchBuilder {
        BatchBuilder::with_capacity(self.address, capacity)
    }

    /// Execute every call of the batch in a single round trip.
    ///
    /// Individual failures are reported per slot, only a transport failure or
    /// a malformed aggregate response fails the whole batch.
    pub async fn try_aggregate(&self, batch: BatchBuilder) -> Result<BatchResults, MulticallError> {
        let expected = batch.calls.len();
        if expected == 0 {
            return Ok(BatchResults::default());
        }

        let call = IMulticall3::tryAggregateCall {
            requireSuccess: false,
            calls: batch.calls,
        };
        if log::log_enabled!(log::Level::Debug) {
            debug!("Submitting tryAggregate with {} calls", expected);
        }

        let output = self
            .client
            .call(self.address, Bytes::from(call.abi_encode()))
            .await?;
        let decoded = IMulticall3::tryAggregateCall::abi_decode_returns(&output, true)
            .map_err(|e| MulticallError::Decode(e.to_string()))?;

        let results = decoded.returnData;
        if results.len() != expected {
            return Err(MulticallError::LengthMismatch {
                expected,
                got: results.len(),
            });
        }

        Ok(BatchResults::from_results(results))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::IERC20Metadata;
    use alloy_primitives::{address, U256};

    const MULTICALL: Address = address!("cA11bde05977b3631167028862bE2a173976CA11");
    const TOKEN: Address = address!("833589fCD6eDb6E08f4c7C32D4f71b54bdA02913");

    fn ok(data: Vec<u8>) -> CallResult {
        CallResult {
            success: true,
            returnData: Bytes::from(data),
        }
    }

    #[test]
    fn test_handles_follow_push_order() {
        let mut batch = BatchBuilder::new(MULTICALL);
        let a = batch.push(TOKEN, &IERC20Metadata::symbolCall {});
        let b = batch.push_placeholder::<IERC20Metadata::totalSupplyCall>();
        let c = batch.push(TOKEN, &IERC20Metadata::decimalsCall {});

        assert_eq!((a.index(), b.index(), c.index()), (0, 1, 2));
        assert_eq!(batch.len(), 3);
        assert_eq!(batch.calls[1].target, MULTICALL);
        assert!(batch.calls[1].callData.is_empty());
        assert_eq!(
            batch.calls[2].callData.as_ref(),
            IERC20Metadata::decimalsCall {}.abi_encode().as_slice()
        );
    }

    #[test]
    fn test_decode_outcomes() {
        let mut batch = BatchBuilder::new(MULTICALL);
        let supply = batch.push(TOKEN, &IERC20Metadata::totalSupplyCall {});
        let reverted = batch.push(TOKEN, &IERC20Metadata::totalSupplyCall {});
        let empty = batch.push(TOKEN, &IERC20Metadata::totalSupplyCall {});
        let garbage = batch.push(TOKEN, &IERC20Metadata::totalSupplyCall {});
        let missing = batch.push(TOKEN, &IERC20Metadata::totalSupplyCall {});

        let results = BatchResults::from_results(vec![
            ok(IERC20Metadata::totalSupplyCall::abi_encode_returns(&(U256::from(42u64),))),
            CallResult {
                success: false,
                returnData: Bytes::new(),
            },
            ok(Vec::new()),
            ok(vec![1, 2, 3]),
        ]);

        assert_eq!(results.decode(&supply).unwrap()._0, U256::from(42u64));
        assert!(matches!(results.decode(&reverted), Err(CallDecodeError::Reverted)));
        assert!(matches!(results.decode(&empty), Err(CallDecodeError::EmptyReturn)));
        assert!(matches!(results.decode(&garbage), Err(CallDecodeError::Abi(_))));
        assert!(matches!(results.decode(&missing), Err(CallDecodeError::MissingSlot(4))));
    }
}
