// Codec, merkle and signing benchmarks for the wallet core.
//
// Covers transaction encode/decode at growing input counts, block decoding,
// merkle roots over wide blocks, and ECDSA signing of a sighash.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use merit_wallet_core::codec::{
    merkle_root, Block, BlockHeader, Decodable, Encodable, Hash256, OutPoint, Transaction, TxIn, TxOut,
    SIGHASH_ALL,
};
use merit_wallet_core::crypto::keys::PrivateKey;
use merit_wallet_core::script::templates::build_multisig_out;

fn sample_transaction(inputs: usize) -> Transaction {
    Transaction {
        version: 1,
        inputs: (0..inputs)
            .map(|i| TxIn {
                prevout: OutPoint {
                    txid: Hash256::digest(&(i as u64).to_le_bytes()),
                    vout: i as u32,
                },
                script_sig: vec![0x51; 107],
                sequence: u32::MAX,
            })
            .collect(),
        outputs: vec![
            TxOut {
                value: 150_000_000,
                script_pubkey: vec![0x76; 25],
            },
            TxOut {
                value: 2_500_000,
                script_pubkey: vec![0xa9; 23],
            },
        ],
        lock_time: 0,
    }
}

fn sample_block(txs: usize) -> Block {
    let header = BlockHeader {
        version: 3,
        prev_block: Hash256::digest(b"parent"),
        merkle_root: Hash256::ZERO,
        time: 1_700_000_000,
        bits: 0x1d00_ffff,
        nonce: 42,
    };
    let transactions = (0..txs).map(|i| sample_transaction(1 + i % 3)).collect();
    Block::new(header, transactions, vec![sample_transaction(1)], Vec::new())
}

fn bench_transaction_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec/transaction");

    for inputs in [1, 10, 100] {
        let tx = sample_transaction(inputs);
        let bytes = tx.encode();

        group.throughput(Throughput::Bytes(bytes.len() as u64));
        group.bench_with_input(BenchmarkId::new("encode", inputs), &tx, |b, tx| {
            b.iter(|| tx.encode());
        });
        group.bench_with_input(BenchmarkId::new("decode", inputs), &bytes, |b, bytes| {
            b.iter(|| Transaction::decode(bytes).unwrap());
        });
    }

    group.finish();
}

fn bench_block_decode(c: &mut Criterion) {
    let bytes = sample_block(200).encode();

    c.bench_function("codec/block_decode_200", |b| {
        b.iter(|| {
            let block = Block::decode(&bytes).unwrap();
            assert!(block.valid_merkle_root());
        });
    });
}

fn bench_merkle_root(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec/merkle_root");

    for size in [1, 15, 256, 2001] {
        let leaves: Vec<Hash256> = (0..size as u64).map(|i| Hash256::digest(&i.to_le_bytes())).collect();

        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &leaves, |b, leaves| {
            b.iter(|| merkle_root(leaves));
        });
    }

    group.finish();
}

fn bench_sign_multisig_input(c: &mut Criterion) {
    let keys: Vec<PrivateKey> = (0..3).map(|_| PrivateKey::generate()).collect();
    let pubkeys: Vec<_> = keys.iter().map(PrivateKey::public_key).collect();
    let redeem = build_multisig_out(&pubkeys, 2).unwrap();
    let tx = sample_transaction(4);

    c.bench_function("ecdsa/sign_multisig_input", |b| {
        b.iter(|| {
            let digest = tx.signature_hash(2, redeem.as_bytes(), SIGHASH_ALL).unwrap();
            keys[0].sign_hash(&digest)
        });
    });
}

criterion_group!(
    benches,
    bench_transaction_codec,
    bench_block_decode,
    bench_merkle_root,
    bench_sign_multisig_input,
);
criterion_main!(benches);
