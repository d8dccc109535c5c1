//! Lightning adapter and the wallet unlock state machine.

use std::sync::Arc;
use std::time::Duration;

use bitcoin::absolute::LockTime;
use bitcoin::block::{Header, Version as BlockVersion};
use bitcoin::consensus::encode::{serialize, serialize_hex};
use bitcoin::hashes::Hash;
use bitcoin::script::Builder;
use bitcoin::transaction::Version;
use bitcoin::{
    Amount, Block, BlockHash, CompactTarget, OutPoint, PubkeyHash, ScriptBuf, Sequence, Transaction, TxIn, TxMerkleNode, TxOut,
    Witness,
};
use btc_bridge::error::BridgeError;
use btc_bridge::lifecycle::{CancelToken, TokioClock};
use btc_bridge::lightning::rpc::{CODE_ALREADY_UNLOCKED, CODE_UNAVAILABLE};
use btc_bridge::lightning::{LnTransaction, LnUtxo, RpcFailure, UnlockPolicy, UnlockState, WalletUnlocker};
use btc_bridge::providers::{BlockId, CallOptions, LightningProvider, Network, Provider};
use btc_bridge::wallet::script::data_carrier_script;

mod common;
use common::{decimal, ManualClock, MockLightningRpc};

fn provider(rpc: MockLightningRpc) -> (LightningProvider, Arc<MockLightningRpc>, Arc<WalletUnlocker>) {
    let rpc = Arc::new(rpc);
    let unlocker = Arc::new(WalletUnlocker::new(rpc.clone(), "password").with_clock(ManualClock::new()));
    let provider = LightningProvider::new(Network::Testnet, "127.0.0.1:10009", unlocker.clone());
    (provider, rpc, unlocker)
}

fn data_tx() -> Transaction {
    Transaction {
        version: Version::TWO,
        lock_time: LockTime::ZERO,
        input: vec![TxIn {
            previous_output: OutPoint::new(bitcoin::Txid::from_byte_array([0xaa; 32]), 1),
            script_sig: ScriptBuf::new(),
            sequence: Sequence::MAX,
            witness: Witness::new(),
        }],
        output: vec![
            TxOut {
                value: Amount::ZERO,
                script_pubkey: data_carrier_script(b"hello").unwrap(),
            },
            TxOut {
                value: Amount::from_sat(10_771_747),
                script_pubkey: ScriptBuf::new_p2pkh(&PubkeyHash::from_byte_array([0x22; 20])),
            },
        ],
    }
}

fn test_block(height: i64) -> Block {
    let coinbase = Transaction {
        version: Version::ONE,
        lock_time: LockTime::ZERO,
        input: vec![TxIn {
            previous_output: OutPoint::null(),
            script_sig: Builder::new().push_int(height).push_slice([0u8; 4]).into_script(),
            sequence: Sequence::MAX,
            witness: Witness::new(),
        }],
        output: vec![TxOut {
            value: Amount::from_sat(625_000_000),
            script_pubkey: ScriptBuf::new(),
        }],
    };
    let mut block = Block {
        header: Header {
            version: BlockVersion::from_consensus(0x2000_0000),
            prev_blockhash: BlockHash::from_byte_array([0x11; 32]),
            merkle_root: TxMerkleNode::all_zeros(),
            time: 1_519_894_838,
            bits: CompactTarget::from_consensus(0x1a03_8c14),
            nonce: 7,
        },
        txdata: vec![coinbase, data_tx()],
    };
    if let Some(root) = block.compute_merkle_root() {
        block.header.merkle_root = root;
    }
    block
}

#[tokio::test]
async fn test_already_unlocked_counts_as_unlocked() {
    let rpc = MockLightningRpc::new(Network::Testnet)
        .unlock_answers(vec![Err(RpcFailure::new(CODE_ALREADY_UNLOCKED, "wallet already unlocked"))]);
    let (provider, rpc, unlocker) = provider(rpc);

    provider.get_estimated_fee(2, &CallOptions::new()).await.unwrap();
    provider.get_estimated_fee(2, &CallOptions::new()).await.unwrap();
    assert_eq!(rpc.unlock_count(), 1);
    assert_eq!(unlocker.state().await, UnlockState::Unlocked);
}

#[tokio::test]
async fn test_unspent_outputs_filtered_by_address() {
    let mut rpc = MockLightningRpc::new(Network::Testnet);
    rpc.utxos = vec![
        LnUtxo {
            address: "tb1qmine".to_string(),
            txid: "aa".repeat(32),
            output_index: 1,
            amount_sat: 10_871_747,
            pk_script: "0014751e76e8199196d454941c45d1b3a323f1433bd6".to_string(),
            confirmations: 3,
        },
        LnUtxo {
            address: "tb1qother".to_string(),
            txid: "bb".repeat(32),
            output_index: 0,
            amount_sat: 5_000,
            pk_script: String::new(),
            confirmations: 1,
        },
    ];
    let (provider, _, _) = provider(rpc);

    let utxos = provider
        .get_unspent_outputs("tb1qmine", &CallOptions::new())
        .await
        .unwrap()
        .into_value();
    assert_eq!(utxos.len(), 1);
    assert_eq!(utxos[0].source_tx_id, "aa".repeat(32));
    assert_eq!(utxos[0].amount, decimal("0.10871747"));
    assert!(utxos[0].script.as_ref().unwrap().is_p2wpkh());
}

#[tokio::test]
async fn test_broadcast_computes_id_locally() {
    let (provider, rpc, _) = provider(MockLightningRpc::new(Network::Testnet));
    let tx = data_tx();

    let receipt = provider
        .broadcast_transaction(&serialize_hex(&tx), &CallOptions::new())
        .await
        .unwrap()
        .into_value();
    assert_eq!(receipt.tx_id, tx.compute_txid().to_string());
    assert_eq!(rpc.published.lock().unwrap()[0], serialize(&tx));
}

#[tokio::test]
async fn test_broadcast_rejection() {
    let mut rpc = MockLightningRpc::new(Network::Testnet);
    rpc.publish_error = "insufficient fee".to_string();
    let (provider, _, _) = provider(rpc);

    let err = provider
        .broadcast_transaction(&serialize_hex(&data_tx()), &CallOptions::new())
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Invalid response : - : insufficient fee");

    let err = provider.broadcast_transaction("zz", &CallOptions::new()).await.unwrap_err();
    assert!(matches!(err, BridgeError::InvalidInput(_)));
}

#[tokio::test]
async fn test_transaction_decoded_from_raw() {
    let tx = data_tx();
    let id = tx.compute_txid().to_string();
    let mut rpc = MockLightningRpc::new(Network::Testnet);
    rpc.transactions = vec![LnTransaction {
        tx_hash: id.clone(),
        amount_sat: -100_000,
        num_confirmations: 4,
        block_hash: "00".repeat(32),
        block_height: 1_255_000,
        time_stamp: 1_519_894_838,
        total_fees: 100_000,
        raw_tx_hex: serialize_hex(&tx),
    }];
    let (provider, _, _) = provider(rpc);

    let summary = provider
        .get_transaction_data(&id, &CallOptions::new().with_raw())
        .await
        .unwrap();
    assert_eq!(summary.raw.as_ref().unwrap().provider, "lightning");
    let summary = summary.value;
    assert_eq!(summary.id, id);
    assert_eq!(summary.version, 2);
    assert_eq!(summary.confirmations, 4);
    assert_eq!(summary.value_out, decimal("0.10771747"));
    assert_eq!(summary.fees, decimal("0.001"));
    assert_eq!(summary.value_in, decimal("0.10871747"));
    assert_eq!(summary.embedded_data.as_deref(), Some("68656c6c6f"));
    assert_eq!(summary.block_time, None);

    let missing = provider.get_transaction_data(&"ff".repeat(32), &CallOptions::new()).await;
    assert!(matches!(missing, Err(BridgeError::Remote { .. })));
}

#[tokio::test]
async fn test_block_by_height_and_hash() {
    let block = test_block(1_255_000);
    let hash = block.block_hash();
    let mut rpc = MockLightningRpc::new(Network::Testnet);
    rpc.blocks = vec![(1_255_000, hash.to_byte_array().to_vec(), serialize(&block))];
    rpc.info.block_height = 1_255_009;
    let (provider, _, _) = provider(rpc);

    let by_height = provider
        .get_block_data(&BlockId::Height(1_255_000), &CallOptions::new())
        .await
        .unwrap()
        .into_value();
    assert_eq!(by_height.hash, hash.to_string());
    assert_eq!(by_height.height, 1_255_000);
    assert_eq!(by_height.confirmations, 10);
    assert_eq!(by_height.merkle_root, block.header.merkle_root.to_string());
    assert_eq!(by_height.previous_block_hash, Some(BlockHash::from_byte_array([0x11; 32]).to_string()));
    assert_eq!(by_height.nonce, 7);
    assert_eq!(by_height.transaction_ids.len(), 2);
    assert_eq!(by_height.transaction_ids[1], data_tx().compute_txid().to_string());
    assert!((by_height.difficulty - 4_729_661.074_040_298).abs() < 1e-6);

    let by_hash = provider
        .get_block_data(&BlockId::Hash(hash.to_string()), &CallOptions::new())
        .await
        .unwrap()
        .into_value();
    assert_eq!(by_hash.height, 1_255_000);
    assert_eq!(by_hash.hash, by_height.hash);
}

#[tokio::test]
async fn test_fee_estimate_from_weight_units() {
    let (provider, rpc, _) = provider(MockLightningRpc::new(Network::Testnet));

    let fee = provider.get_estimated_fee(1, &CallOptions::new()).await.unwrap().into_value();
    // 2500 sat/kW * 4 = 10000 sat per 1000 vbytes
    assert_eq!(fee.rate_per_kilo_byte, decimal("0.0001"));
    provider.get_estimated_fee(6, &CallOptions::new()).await.unwrap();
    assert_eq!(*rpc.fee_targets.lock().unwrap(), vec![2, 6]);

    let err = provider.get_estimated_fee(0, &CallOptions::new()).await.unwrap_err();
    assert!(matches!(err, BridgeError::InvalidInput(_)));
}

#[tokio::test]
async fn test_non_positive_fee_rejected() {
    let mut rpc = MockLightningRpc::new(Network::Testnet);
    rpc.sat_per_kw = 0;
    let (provider, _, _) = provider(rpc);
    let err = provider.get_estimated_fee(2, &CallOptions::new()).await.unwrap_err();
    assert!(err.to_string().contains("Invalid estimated fee value received: 0"));
}

#[tokio::test]
async fn test_verify_network() {
    let (provider, _, _) = provider(MockLightningRpc::new(Network::Testnet));
    provider.verify_network().await.unwrap();

    let (mainnet_node, _, _) = provider_on_wrong_chain();
    assert!(matches!(mainnet_node.verify_network().await, Err(BridgeError::Config(_))));
}

fn provider_on_wrong_chain() -> (LightningProvider, Arc<MockLightningRpc>, Arc<WalletUnlocker>) {
    let rpc = MockLightningRpc::new(Network::Mainnet);
    let rpc = Arc::new(rpc);
    let unlocker = Arc::new(WalletUnlocker::new(rpc.clone(), "password"));
    (LightningProvider::new(Network::Testnet, "127.0.0.1:10009", unlocker.clone()), rpc, unlocker)
}

#[tokio::test]
async fn test_unlock_gives_up_after_max_attempts() {
    let rpc = Arc::new(MockLightningRpc::new(Network::Testnet).never_unlocks(CODE_UNAVAILABLE));
    let clock = ManualClock::new();
    let unlocker = WalletUnlocker::new(rpc.clone(), "password").with_clock(clock.clone());

    let err = unlocker.ensure_unlocked(&CancelToken::new()).await.unwrap_err();
    assert!(matches!(err, BridgeError::UnlockTimeout { attempts: 60 }));
    assert_eq!(rpc.unlock_count(), 60);
    let sleeps = clock.sleeps();
    assert_eq!(sleeps.len(), 59);
    assert!(sleeps.iter().all(|d| *d == Duration::from_millis(500)));
    assert_eq!(unlocker.state().await, UnlockState::Failed { attempts: 60 });

    // sticky until reset
    let again = unlocker.ensure_unlocked(&CancelToken::new()).await.unwrap_err();
    assert!(matches!(again, BridgeError::UnlockTimeout { .. }));
    assert_eq!(rpc.unlock_count(), 60);

    unlocker.reset().await;
    assert_eq!(unlocker.state().await, UnlockState::Locked);
    let _ = unlocker.ensure_unlocked(&CancelToken::new()).await;
    assert_eq!(rpc.unlock_count(), 120);
}

#[tokio::test]
async fn test_unlock_succeeds_after_retries() {
    let rpc = Arc::new(MockLightningRpc::new(Network::Testnet).unlock_answers(vec![
        Err(RpcFailure::new(CODE_UNAVAILABLE, "starting up")),
        Err(RpcFailure::new(CODE_UNAVAILABLE, "starting up")),
    ]));
    let clock = ManualClock::new();
    let unlocker = WalletUnlocker::new(rpc.clone(), "password")
        .with_clock(clock.clone())
        .with_policy(UnlockPolicy {
            max_attempts: 5,
            retry_delay: Duration::from_millis(20),
        });

    unlocker.ensure_unlocked(&CancelToken::new()).await.unwrap();
    assert_eq!(rpc.unlock_count(), 3);
    assert_eq!(clock.sleeps(), vec![Duration::from_millis(20); 2]);
    assert_eq!(unlocker.state().await, UnlockState::Unlocked);
}

#[tokio::test]
async fn test_cancelled_unlock_returns_to_locked() {
    let rpc = Arc::new(MockLightningRpc::new(Network::Testnet));
    let unlocker = WalletUnlocker::new(rpc.clone(), "password");
    let cancel = CancelToken::new();
    cancel.cancel();

    let err = unlocker.ensure_unlocked(&cancel).await.unwrap_err();
    assert!(matches!(err, BridgeError::Cancelled));
    assert_eq!(unlocker.state().await, UnlockState::Locked);
    assert_eq!(rpc.unlock_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_waiting_caller_cancels_while_another_retries() {
    let rpc = Arc::new(MockLightningRpc::new(Network::Testnet).never_unlocks(CODE_UNAVAILABLE));
    let unlocker = Arc::new(WalletUnlocker::new(rpc.clone(), "password").with_clock(Arc::new(TokioClock)));

    let first = tokio::spawn({
        let unlocker = unlocker.clone();
        async move { unlocker.ensure_unlocked(&CancelToken::new()).await }
    });
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(rpc.unlock_count() >= 1);

    let cancel = CancelToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        trigger.cancel();
    });
    let started = tokio::time::Instant::now();
    let err = unlocker.ensure_unlocked(&cancel).await.unwrap_err();
    assert!(matches!(err, BridgeError::Cancelled));
    assert!(started.elapsed() < Duration::from_secs(2));

    // the first caller keeps its own attempt budget
    let first = first.await.unwrap().unwrap_err();
    assert!(matches!(first, BridgeError::UnlockTimeout { attempts: 60 }));
    assert_eq!(rpc.unlock_count(), 60);
    assert_eq!(unlocker.state().await, UnlockState::Failed { attempts: 60 });
}

#[test]
fn test_password_not_in_debug_output() {
    let unlocker = WalletUnlocker::new(Arc::new(MockLightningRpc::new(Network::Testnet)), "correct horse");
    assert!(!format!("{:?}", unlocker).contains("correct horse"));
}
