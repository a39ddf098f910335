//! Example usage of the [`sealed_auctions`] crate.
//!
//! Each party is represented by a worker thread. Workers hand their outgoing
//! [`Message`]s to the main thread over [`std::sync::mpsc`] channels, and the
//! main thread routes them to the recipient's [`RoundGate`]. A send only
//! completes once the recipient accepted the message, so delivery errors reach
//! the sending party.

use anyhow::{self, Context};
use clap::{Parser, ValueEnum};
use rand::{rngs::StdRng, Rng, SeedableRng};
use sealed_auctions::{
    run_first_price, run_millionaire, FirstPriceConfig, Message, MillionaireConfig, NamedGroup,
    ParticipantConfig, PartyContext, PartyId, RoundGate, Transport,
};
use std::{
    collections::BTreeMap,
    sync::{
        mpsc::{channel, Receiver, Sender},
        Arc, Mutex,
    },
    thread,
    time::Instant,
};
use tracing::{error, info, span, warn, Level};
use tracing_subscriber::{self, EnvFilter};

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
enum Protocol {
    /// Two-party comparison of secret values.
    Millionaire,
    /// First-price sealed-bid auction.
    FirstPrice,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
enum Group {
    Toy,
    Modp1024,
    Modp2048,
}

impl From<Group> for NamedGroup {
    fn from(group: Group) -> Self {
        match group {
            Group::Toy => NamedGroup::Toy,
            Group::Modp1024 => NamedGroup::Modp1024,
            Group::Modp2048 => NamedGroup::Modp2048,
        }
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct CommandLineArgs {
    /// Which protocol to run.
    #[arg(value_enum)]
    protocol: Protocol,
    /// Number of parties; the comparison always uses two.
    #[arg(short, long, default_value_t = 3)]
    parties: usize,
    /// Bit width of compared values, or number of price levels.
    #[arg(short, long)]
    width: Option<usize>,
    /// Group to run in.
    #[arg(short, long, value_enum, default_value_t = Group::Toy)]
    group: Group,
}

/// What workers send to the main thread.
enum Envelope {
    /// A message and where to report whether its recipient accepted it.
    Deliver(Message, Sender<sealed_auctions::Result<()>>),
    Halt,
}

/// Hands every outgoing message to the main thread for routing and waits
/// for the recipient's gate to accept or reject it.
struct ChannelTransport {
    to_router: Mutex<Sender<Envelope>>,
}

impl ChannelTransport {
    fn send(&self, envelope: Envelope) -> sealed_auctions::Result<()> {
        let sender = self
            .to_router
            .lock()
            .map_err(|_| sealed_auctions::InternalError::InternalInvariantFailed)?;
        sender
            .send(envelope)
            .map_err(|_| sealed_auctions::InternalError::Halted)
    }
}

impl Transport for ChannelTransport {
    fn publish(&self, message: Message) -> sealed_auctions::Result<()> {
        let (reply, outcome) = channel();
        self.send(Envelope::Deliver(message, reply))?;
        outcome
            .recv()
            .map_err(|_| sealed_auctions::InternalError::Halted)?
    }

    fn halt(&self) {
        if self.send(Envelope::Halt).is_err() {
            warn!("The router is gone; nothing left to halt");
        }
    }
}

/// Forwards messages to their recipients' gates until every worker is done.
///
/// Each delivery runs on its own thread, since a gate blocks deliveries until
/// its owner is ready, and reports its result back to the sender. The router
/// joins all of them before returning.
fn route(gates: &BTreeMap<PartyId, Arc<RoundGate>>, from_workers: Receiver<Envelope>) {
    let mut deliveries = Vec::new();
    for envelope in from_workers {
        match envelope {
            Envelope::Deliver(message, reply) => {
                let Some(gate) = gates.get(&message.to()).cloned() else {
                    error!("Dropping a message to unknown {}", message.to());
                    if reply
                        .send(Err(sealed_auctions::InternalError::WrongMessageRecipient))
                        .is_err()
                    {
                        warn!("The sender stopped waiting");
                    }
                    continue;
                };
                deliveries.push(thread::spawn(move || {
                    let outcome = gate.deliver(message);
                    if let Err(e) = &outcome {
                        warn!("Delivery failed: {e}");
                    }
                    if reply.send(outcome).is_err() {
                        warn!("The sender stopped waiting");
                    }
                }));
            }
            Envelope::Halt => gates.values().for_each(|gate| gate.halt()),
        }
    }
    for delivery in deliveries {
        if delivery.join().is_err() {
            error!("A delivery thread panicked");
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = CommandLineArgs::parse();
    let filter = EnvFilter::from_default_env().add_directive("threaded_auction=info".parse()?);
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .without_time()
        .compact()
        .init();
    let span = span!(Level::INFO, "main");
    let _enter = span.entered();

    let party_count = match cli.protocol {
        Protocol::Millionaire => 2,
        Protocol::FirstPrice => cli.parties,
    };
    let group = NamedGroup::from(cli.group).parameters();
    let width = cli.width.unwrap_or(8);
    let (millionaire, first_price) = match cli.protocol {
        Protocol::Millionaire => (
            MillionaireConfig::new(group, width)?,
            FirstPriceConfig::default(),
        ),
        Protocol::FirstPrice => (
            MillionaireConfig::default(),
            FirstPriceConfig::new(group, width)?,
        ),
    };

    let participants = ParticipantConfig::quorum(party_count)?;
    let gates: BTreeMap<_, _> = participants
        .iter()
        .map(|p| (p.id, Arc::new(RoundGate::new(p.id, party_count))))
        .collect();
    let (to_router, from_workers) = channel();

    let mut rng = StdRng::from_entropy();
    let mut workers = Vec::new();
    info!("Spawning {party_count} worker threads");
    for participant in participants {
        let gate = gates
            .get(&participant.id)
            .cloned()
            .context("every participant has a gate")?;
        let transport = Arc::new(ChannelTransport {
            to_router: Mutex::new(to_router.clone()),
        });
        let context = PartyContext::new(participant, gate, transport);
        let millionaire = millionaire.clone();
        let first_price = first_price.clone();
        let protocol = cli.protocol;
        let secret = match protocol {
            Protocol::Millionaire => rng.gen_range(0..1u64 << millionaire.bit_width().min(63)),
            Protocol::FirstPrice => rng.gen_range(0..first_price.price_levels()) as u64,
        };
        info!("{} holds secret input {}", participant.id, secret);
        workers.push(thread::spawn(move || -> anyhow::Result<String> {
            let mut rng = StdRng::from_entropy();
            let outcome = match protocol {
                Protocol::Millionaire => {
                    let output = run_millionaire(&millionaire, &context, secret, &mut rng)?;
                    format!("{} holds the larger value", output.winner)
                }
                Protocol::FirstPrice => {
                    let outcome =
                        run_first_price(&first_price, &context, secret as usize, &mut rng)?;
                    format!("{} wins at price level {}", outcome.winner, outcome.price)
                }
            };
            Ok(outcome)
        }));
    }
    // Workers hold the remaining senders; routing ends once all are done.
    drop(to_router);

    let start = Instant::now();
    route(&gates, from_workers);
    for (i, worker) in workers.into_iter().enumerate() {
        match worker.join() {
            Ok(Ok(outcome)) => info!("Party({i}): {outcome}"),
            Ok(Err(e)) => error!("Party({i}) failed: {e}"),
            Err(_) => error!("Party({i}) panicked"),
        }
    }
    info!("Finished in {:?}", start.elapsed());
    Ok(())
}
