//! Chain access
//!
//! [`ChainClient`] is the narrow slice of JSON-RPC the deployment needs.
//! [`AlloyChainClient`] implements it over HTTP with a local signer.

use std::fmt::Display;
use std::future::IntoFuture;
use std::time::Duration;

use alloy::eips::BlockId;
use alloy::network::{EthereumWallet, ReceiptResponse, TransactionBuilder};
use alloy::primitives::{Address, Bytes, B256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use alloy::sol_types::decode_revert_reason;
use alloy::transports::http::reqwest::Url;
use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::types::ReceiptInfo;

#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Chain id reported by the node
    async fn chain_id(&self) -> Result<u64>;

    /// Sign and broadcast a contract creation transaction
    async fn send_creation(&self, payload: Bytes) -> Result<B256>;

    /// Receipt for a transaction, `None` while it is not mined
    async fn receipt(&self, tx_hash: B256) -> Result<Option<ReceiptInfo>>;

    /// Latest block number
    async fn block_number(&self) -> Result<u64>;

    /// Runtime code at an address (empty when nothing is deployed)
    async fn code_at(&self, address: Address) -> Result<Bytes>;

    /// Re-execute a reverted creation against the state before `block` and
    /// decode its revert reason, if the node exposes one
    async fn revert_reason(&self, payload: Bytes, block: u64) -> Result<Option<String>>;
}

/// [`ChainClient`] backed by an alloy HTTP provider
pub struct AlloyChainClient {
    provider: DynProvider,
    signer: Option<Address>,
    timeout: Duration,
}

impl AlloyChainClient {
    /// Connect with a signing key
    pub fn new(rpc_url: &str, private_key: &str, timeout: Duration) -> Result<Self> {
        let url = parse_url(rpc_url)?;
        let signer: PrivateKeySigner = private_key
            .trim()
            .parse()
            .map_err(|e| Error::config(format!("Invalid private key: {}", e)))?;
        let address = signer.address();

        let wallet = EthereumWallet::from(signer);
        let provider = ProviderBuilder::new()
            .wallet(wallet)
            .connect_http(url)
            .erased();

        Ok(Self {
            provider,
            signer: Some(address),
            timeout,
        })
    }

    /// Connect without a signer; only read operations are available
    pub fn read_only(rpc_url: &str, timeout: Duration) -> Result<Self> {
        let url = parse_url(rpc_url)?;
        let provider = ProviderBuilder::new().connect_http(url).erased();

        Ok(Self {
            provider,
            signer: None,
            timeout,
        })
    }

    /// Address of the configured signer
    pub fn signer_address(&self) -> Option<Address> {
        self.signer
    }

    async fn timed<T, E, F>(&self, what: &str, fut: F) -> Result<T>
    where
        E: Display,
        F: IntoFuture<Output = std::result::Result<T, E>>,
    {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| Error::rpc(format!("{} timed out after {:?}", what, self.timeout)))?
            .map_err(|e| Error::rpc(format!("{} failed: {}", what, e)))
    }
}

fn parse_url(rpc_url: &str) -> Result<Url> {
    rpc_url
        .parse()
        .map_err(|e| Error::config(format!("Invalid RPC URL '{}': {}", rpc_url, e)))
}

#[async_trait]
impl ChainClient for AlloyChainClient {
    async fn chain_id(&self) -> Result<u64> {
        self.timed("eth_chainId", self.provider.get_chain_id()).await
    }

    async fn send_creation(&self, payload: Bytes) -> Result<B256> {
        if self.signer.is_none() {
            return Err(Error::config(
                "A private key is required to send the deployment transaction",
            ));
        }

        let tx = TransactionRequest::default().with_deploy_code(payload);
        let pending = tokio::time::timeout(self.timeout, self.provider.send_transaction(tx))
            .await
            .map_err(|_| Error::submission(format!("send timed out after {:?}", self.timeout)))?
            .map_err(|e| Error::submission(e.to_string()))?;

        Ok(*pending.tx_hash())
    }

    async fn receipt(&self, tx_hash: B256) -> Result<Option<ReceiptInfo>> {
        let receipt = self
            .timed(
                "eth_getTransactionReceipt",
                self.provider.get_transaction_receipt(tx_hash),
            )
            .await?;

        Ok(receipt.map(|r| ReceiptInfo {
            tx_hash: ReceiptResponse::transaction_hash(&r),
            success: ReceiptResponse::status(&r),
            block_number: ReceiptResponse::block_number(&r),
            contract_address: ReceiptResponse::contract_address(&r),
        }))
    }

    async fn block_number(&self) -> Result<u64> {
        self.timed("eth_blockNumber", self.provider.get_block_number())
            .await
    }

    async fn code_at(&self, address: Address) -> Result<Bytes> {
        self.timed("eth_getCode", self.provider.get_code_at(address))
            .await
    }

    async fn revert_reason(&self, payload: Bytes, block: u64) -> Result<Option<String>> {
        let mut tx = TransactionRequest::default().with_deploy_code(payload);
        if let Some(from) = self.signer {
            tx = tx.from(from);
        }

        let call = self
            .provider
            .call(tx)
            .block(BlockId::number(block.saturating_sub(1)));

        let err = match tokio::time::timeout(self.timeout, call).await {
            Err(_) => return Err(Error::rpc("eth_call replay timed out")),
            Ok(Ok(_)) => return Ok(None),
            Ok(Err(err)) => err,
        };

        let Some(payload) = err.as_error_resp() else {
            return Err(Error::rpc(format!("eth_call replay failed: {}", err)));
        };

        let reason = payload
            .as_revert_data()
            .and_then(|data| decode_revert_reason(&data))
            .or_else(|| {
                payload
                    .message
                    .strip_prefix("execution reverted: ")
                    .map(str::to_string)
            });

        Ok(reason)
    }
}
