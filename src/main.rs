use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use clap::Parser as _;
use pallas_addresses::{
    Address, Network, ShelleyAddress, ShelleyDelegationPart, ShelleyPaymentPart,
};
use pallas_crypto::hash::Hash;
use pallas_traverse::OutputRef;
use tracing::info;

use pool_lock::{
    PoolReference, RedeemerBuilder, Validator, build_datum,
    ledger::{MemoryKeyStore, MemoryLedger},
    logging::{LogFormat, init_logging},
    pools::{KNOWN_POOLS, KnownPool, UNTYPED_POOLS, UntypedPool, resolve_known_pools},
    tx::Assembler,
    types::{PubKeyHash, Utxo, display_address, display_output_ref},
};

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum NetworkArg {
    Mainnet,
    Preprod,
    Preview,
}

impl From<NetworkArg> for Network {
    fn from(n: NetworkArg) -> Self {
        match n {
            NetworkArg::Mainnet => Network::Mainnet,
            NetworkArg::Preprod | NetworkArg::Preview => Network::Testnet,
        }
    }
}

#[derive(clap::Parser, Debug)]
#[command(
    name = "pool-lock",
    version,
    about = "Build lock/unlock data for the pool lock validator"
)]
struct Args {
    #[arg(long, env = "POOL_LOCK_NETWORK", value_enum, default_value = "mainnet")]
    network: NetworkArg,

    /// CIP-57 blueprint holding the compiled validator.
    #[arg(long, env = "POOL_LOCK_BLUEPRINT", default_value = "plutus.json")]
    blueprint: PathBuf,

    #[arg(long, env = "POOL_LOCK_LOG_FORMAT", value_enum, default_value = "pretty")]
    log_format: LogFormat,

    #[arg(long, env = "RUST_LOG_DEFAULT", default_value = "pool_lock=info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

fn parse_key_hash(s: &str) -> Result<PubKeyHash> {
    let bytes = hex::decode(s)?;

    bytes.try_into().map(Hash::new).map_err(|b: Vec<u8>| {
        anyhow!(
            "Expected length 32 for owner key hash, but got {}",
            b.len()
        )
    })
}

fn parse_pool_ref(s: &str) -> Result<PoolReference> {
    Ok(s.parse()?)
}

fn parse_known_pool(s: &str) -> Result<KnownPool> {
    KnownPool::by_name(s).ok_or_else(|| {
        let names: Vec<_> = KNOWN_POOLS.iter().map(|p| p.name).collect();
        anyhow!("unknown pool {s}, expected one of {}", names.join(", "))
    })
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Print the validator's script hash and address.
    Address,
    /// Encode a locked datum.
    Datum {
        #[arg(long, value_parser = parse_key_hash)]
        owner: PubKeyHash,

        #[arg(long, default_value_t = 100)]
        target: u64,
    },
    /// Encode an unlock redeemer from `<tx hash>#<index>:<pool type>` references.
    Unlock {
        #[arg(long = "pool", required = true, value_parser = parse_pool_ref)]
        pools: Vec<PoolReference>,
    },
    /// Encode the cancel redeemer.
    Cancel,
    /// List the known liquidity pools.
    Pools,
    /// Run a lock then unlock against an in-memory ledger.
    Simulate {
        #[arg(long, default_value_t = 5_000_000)]
        lovelace: u64,

        #[arg(long, default_value_t = 100)]
        target: u64,

        /// Pools to reference, in order. Defaults to every known pool.
        #[arg(long = "pool-name", value_parser = parse_known_pool)]
        pools: Vec<KnownPool>,
    },
}

async fn simulate(
    validator: Validator,
    network: Network,
    lovelace: u64,
    target: u64,
    pools: &[KnownPool],
) -> Result<()> {
    let key_hash = Hash::new([0x11; 32]);
    let wallet = Address::Shelley(ShelleyAddress::new(
        network,
        ShelleyPaymentPart::Key(Hash::new([0x11; 28])),
        ShelleyDelegationPart::Null,
    ));

    let ledger = Arc::new(MemoryLedger::new(network));
    for (i, pool) in KNOWN_POOLS.iter().enumerate() {
        ledger.insert(Utxo {
            output_ref: OutputRef::new(Hash::new([i as u8 + 1; 32]), 0),
            address: pool.lp_address()?,
            lovelace: 50_000_000,
            assets: vec![(pool.unit()?, 1)],
            inline_datum: None,
        })?;
    }

    let assembler = Assembler::new(
        ledger.clone(),
        MemoryKeyStore::new(key_hash, wallet),
        validator,
    );
    let locked = assembler.lock(build_datum(key_hash, target)?, lovelace).await?;
    println!(
        "locked   {} ({:?})",
        display_output_ref(&locked.locked.output_ref),
        locked.locked.state
    );

    let refs = resolve_known_pools(ledger.as_ref(), pools).await?;
    let redeemer = RedeemerBuilder::new().pools(refs).unlock()?;
    let unlocked = assembler.unlock(&locked.locked.output_ref, redeemer).await?;
    println!("unlocked {} ({:?})", unlocked.tx_hash, unlocked.spent.state);
    Ok(())
}

fn load_validator(path: &Path) -> Result<Validator> {
    let validator =
        Validator::load(path).with_context(|| format!("loading {}", path.display()))?;
    info!(script_hash = %validator.script_hash(), "loaded validator");
    Ok(validator)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level, args.log_format);
    let network = Network::from(args.network);

    match args.command {
        Commands::Address => {
            let validator = load_validator(&args.blueprint)?;
            println!("script hash {}", validator.script_hash());
            println!("address     {}", display_address(&validator.address(network)));
        }
        Commands::Datum { owner, target } => {
            println!("{}", hex::encode(build_datum(owner, target)?.cbor));
        }
        Commands::Unlock { pools } => {
            let built = RedeemerBuilder::new().pools(pools).unlock()?;
            println!("{}", hex::encode(built.cbor));
        }
        Commands::Cancel => {
            println!("{}", hex::encode(RedeemerBuilder::cancel()?.cbor));
        }
        Commands::Pools => {
            for KnownPool {
                name,
                address,
                nft,
                pool_type,
            } in KNOWN_POOLS
            {
                println!("{name}\ttype={pool_type}\tnft={nft}\taddress={address}");
            }
            for UntypedPool { name, address, nft } in UNTYPED_POOLS {
                println!("{name}\ttype=unknown\tnft={nft}\taddress={address}");
            }
        }
        Commands::Simulate {
            lovelace,
            target,
            pools,
        } => {
            let validator = load_validator(&args.blueprint)?;
            let pools = if pools.is_empty() {
                KNOWN_POOLS.to_vec()
            } else {
                pools
            };
            simulate(validator, network, lovelace, target, &pools).await?;
        }
    }
    Ok(())
}
