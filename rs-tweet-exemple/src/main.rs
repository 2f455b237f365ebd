use rand::SeedableRng;
use rand::rngs::StdRng;
use rs_tweet_core::model::{ChainBuilder, MessageComposer, generate};
use rs_tweet_core::session::replay::ReplaySession;
use rs_tweet_core::{CycleOutcome, PipelineConfig, Scheduler};
use tokio::sync::watch;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // One sentence per line, like the replay session reads them
    let corpus = std::fs::read_to_string("./data/replay.txt")?;

    // Build an order-1 chain: each word predicts the next one
    // Sentences are split on the separator, so nothing links across lines
    let builder = ChainBuilder::new(1)?;
    let model = builder.build(&corpus, "\n");
    println!("{} states, order {}", model.state_count(), model.order());

    // Order 0 is refused
    match ChainBuilder::new(0) {
        Ok(_) => println!("Should not happen"),
        Err(e) => println!("Order 0: {e}"),
    }

    // A seeded generator gives the same walks on every run
    let mut rng = StdRng::seed_from_u64(7);

    // Random walks from a start state, at most 50 words each
    for i in 0..5 {
        let utterance = generate(&model, 50, &mut rng);
        println!("Utterance {} ({:?}): {}", i + 1, utterance.termination(), utterance.text());
    }

    // A higher order sticks closer to the source text
    let order_two = ChainBuilder::new(2)?.build(&corpus, "\n");
    println!("Order 2: {}", generate(&order_two, 50, &mut rng).text());

    // Messages are made of whole utterances joined by spaces and never exceed the budget
    let composer = MessageComposer::default();
    for max_length in [40, 140, 280] {
        let message = composer.compose(&model, max_length, &mut rng);
        println!("Message <= {max_length} ({} chars): {message}", message.chars().count());
    }

    // Run one full cycle over the replay file: ingest, build, compose, publish
    // The replay publisher only logs the message since no output file is given
    let session = ReplaySession::new("./data/replay.txt", None);
    let config = PipelineConfig {
        tweet_count: 20,
        ..PipelineConfig::default()
    };
    let mut scheduler = Scheduler::new(session, config)?;
    let (_stop, mut shutdown) = watch::channel(false);
    match scheduler.run_cycle(&mut shutdown).await? {
        CycleOutcome::Published(message) => println!("Published: {message}"),
        CycleOutcome::Interrupted => println!("Interrupted"),
    }

    Ok(())
}
