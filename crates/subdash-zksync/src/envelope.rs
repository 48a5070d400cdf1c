//! The zkSync EIP-712 transaction envelope (type `0x71`).
//!
//! Calls that must execute *as* a smart-wallet account cannot be sent as
//! ordinary Ethereum transactions: the account validates them itself, using a
//! signature carried in the envelope's `customSignature` field. The same
//! envelope carries the paymaster parameters that let a fee sponsor pay gas.
//!
//! Building one follows a fixed pipeline:
//!
//! 1. populate target, calldata and value ([`Eip712Transaction::new`]);
//! 2. optionally attach [`PaymasterParams`];
//! 3. fill nonce and gas price, then estimate gas with
//!    [`Eip712Transaction::estimate_request`];
//! 4. [`sign`](Eip712Transaction::sign) the EIP-712 hash with the account owner's key;
//! 5. [`encode`](Eip712Transaction::encode) and broadcast the raw bytes.
//!
//! Factory dependencies are always empty: the dashboard never deploys bytecode.

use alloy_primitives::{Address, B256, Bytes, U256};
use alloy_rlp::{BufMut, EMPTY_LIST_CODE, EMPTY_STRING_CODE, Encodable, Header};
use alloy_signer::Signer;
use alloy_sol_types::{SolCall, SolStruct, eip712_domain};
use serde_json::{Value, json};

use crate::contracts::IPaymasterFlow;

/// Transaction type of zkSync EIP-712 transactions.
pub const EIP712_TX_TYPE: u8 = 0x71;

/// Default gas-per-pubdata limit, as used by zkSync SDKs.
pub const DEFAULT_GAS_PER_PUBDATA: u64 = 50_000;

mod typed {
    use alloy_sol_types::sol;

    sol! {
        #[derive(Debug)]
        struct Transaction {
            uint256 txType;
            uint256 from;
            uint256 to;
            uint256 gasLimit;
            uint256 gasPerPubdataByteLimit;
            uint256 maxFeePerGas;
            uint256 maxPriorityFeePerGas;
            uint256 paymaster;
            uint256 nonce;
            uint256 value;
            bytes data;
            bytes32[] factoryDeps;
            bytes paymasterInput;
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    #[error("custom signature is missing")]
    MissingSignature,
    #[error("failed to sign envelope: {0}")]
    Signing(String),
}

/// Paymaster address and flow input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymasterParams {
    pub paymaster: Address,
    pub input: Bytes,
}

impl PaymasterParams {
    /// The "General" paymaster flow with empty inner input.
    pub fn general(paymaster: Address) -> Self {
        let input = IPaymasterFlow::generalCall {
            input: Bytes::new(),
        }
        .abi_encode();
        Self {
            paymaster,
            input: input.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Eip712Transaction {
    pub chain_id: u64,
    pub from: Address,
    pub to: Address,
    pub nonce: u64,
    pub gas_limit: u64,
    /// Used as both max fee and max priority fee.
    pub gas_price: u128,
    pub gas_per_pubdata: u64,
    pub value: U256,
    pub data: Bytes,
    pub paymaster: Option<PaymasterParams>,
    pub custom_signature: Option<Bytes>,
}

impl Eip712Transaction {
    pub fn new(chain_id: u64, from: Address, to: Address, data: Bytes) -> Self {
        Self {
            chain_id,
            from,
            to,
            nonce: 0,
            gas_limit: 0,
            gas_price: 0,
            gas_per_pubdata: DEFAULT_GAS_PER_PUBDATA,
            value: U256::ZERO,
            data,
            paymaster: None,
            custom_signature: None,
        }
    }

    pub fn with_value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }

    pub fn with_paymaster(mut self, paymaster: Option<PaymasterParams>) -> Self {
        self.paymaster = paymaster;
        self
    }

    pub fn with_gas_per_pubdata(mut self, gas_per_pubdata: u64) -> Self {
        self.gas_per_pubdata = gas_per_pubdata;
        self
    }

    /// Request object for `eth_estimateGas`, carrying the zkSync `eip712Meta`.
    pub fn estimate_request(&self) -> Value {
        let mut meta = json!({
            "gasPerPubdata": U256::from(self.gas_per_pubdata),
            "factoryDeps": [],
        });
        if let Some(signature) = &self.custom_signature {
            meta["customSignature"] = json!(signature);
        }
        if let Some(paymaster) = &self.paymaster {
            // zkSync nodes expect the input as a plain byte array here.
            meta["paymasterParams"] = json!({
                "paymaster": paymaster.paymaster,
                "paymasterInput": paymaster.input.to_vec(),
            });
        }
        let mut request = json!({
            "from": self.from,
            "to": self.to,
            "data": self.data,
            "value": self.value,
            "type": format!("{EIP712_TX_TYPE:#x}"),
            "eip712Meta": meta,
        });
        if self.gas_price > 0 {
            request["gasPrice"] = json!(U256::from(self.gas_price));
        }
        request
    }

    /// EIP-712 hash the account owner signs.
    pub fn signing_hash(&self) -> B256 {
        let domain = eip712_domain! {
            name: "zkSync",
            version: "2",
            chain_id: self.chain_id,
        };
        let (paymaster, paymaster_input) = match &self.paymaster {
            Some(params) => (address_word(params.paymaster), params.input.clone()),
            None => (U256::ZERO, Bytes::new()),
        };
        let typed = typed::Transaction {
            txType: U256::from(EIP712_TX_TYPE),
            from: address_word(self.from),
            to: address_word(self.to),
            gasLimit: U256::from(self.gas_limit),
            gasPerPubdataByteLimit: U256::from(self.gas_per_pubdata),
            maxFeePerGas: U256::from(self.gas_price),
            maxPriorityFeePerGas: U256::from(self.gas_price),
            paymaster,
            nonce: U256::from(self.nonce),
            value: self.value,
            data: self.data.clone(),
            factoryDeps: Vec::new(),
            paymasterInput: paymaster_input,
        };
        typed.eip712_signing_hash(&domain)
    }

    /// Signs the envelope and attaches the signature as custom auth data.
    pub async fn sign<S>(&mut self, signer: &S) -> Result<(), EnvelopeError>
    where
        S: Signer + Send + Sync,
    {
        let hash = self.signing_hash();
        let signature = signer
            .sign_hash(&hash)
            .await
            .map_err(|e| EnvelopeError::Signing(format!("{e:?}")))?;
        self.custom_signature = Some(Bytes::copy_from_slice(&signature.as_bytes()));
        Ok(())
    }

    /// `0x71 || rlp([...])`, ready for `eth_sendRawTransaction`.
    pub fn encode(&self) -> Result<Bytes, EnvelopeError> {
        let signature = match &self.custom_signature {
            Some(signature) if !signature.is_empty() => signature,
            _ => return Err(EnvelopeError::MissingSignature),
        };

        let mut payload = Vec::new();
        self.nonce.encode(&mut payload);
        self.gas_price.encode(&mut payload);
        self.gas_price.encode(&mut payload);
        self.gas_limit.encode(&mut payload);
        self.to.encode(&mut payload);
        self.value.encode(&mut payload);
        self.data.encode(&mut payload);
        // No ECDSA signature: chain id and two empty strings take its place.
        self.chain_id.encode(&mut payload);
        payload.put_u8(EMPTY_STRING_CODE);
        payload.put_u8(EMPTY_STRING_CODE);
        self.chain_id.encode(&mut payload);
        self.from.encode(&mut payload);
        self.gas_per_pubdata.encode(&mut payload);
        payload.put_u8(EMPTY_LIST_CODE);
        signature.encode(&mut payload);
        match &self.paymaster {
            Some(params) => {
                let header = Header {
                    list: true,
                    payload_length: params.paymaster.length() + params.input.length(),
                };
                header.encode(&mut payload);
                params.paymaster.encode(&mut payload);
                params.input.encode(&mut payload);
            }
            None => payload.put_u8(EMPTY_LIST_CODE),
        }

        let header = Header {
            list: true,
            payload_length: payload.len(),
        };
        let mut out = Vec::with_capacity(1 + header.length() + payload.len());
        out.put_u8(EIP712_TX_TYPE);
        header.encode(&mut out);
        out.extend_from_slice(&payload);
        Ok(out.into())
    }
}

fn address_word(address: Address) -> U256 {
    U256::from_be_slice(address.as_slice())
}
