use actchain::{Action, ActionChain, ChannelEvent, ChannelOptions, EngineBuilder};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))).init();

    let engine = EngineBuilder::new().build().unwrap();
    engine.launch();

    let text: serde_json::Value = serde_json::from_str(include_str!("./chain.json")).unwrap();
    for action in text["actions"].as_array().unwrap() {
        engine.put_action(&Action::from_value(action.clone()).unwrap()).unwrap();
    }
    let chain = ActionChain::from_json(&text["chain"].to_string()).unwrap();
    engine.put_chain(&chain).unwrap();

    let events = ChannelEvent::channel(engine.channel(), ChannelOptions::with_chain(&chain.id)).unwrap();
    events.on_event(|e| println!("[{}] {} {}", e.aid, e.action_id, e.event));
    events.on_log(|log| println!("[{}] {}: {}", log.aid, log.action_id, log.content));

    let activation = engine.activate(&chain.id).unwrap();
    println!("waiting for: curl -X POST -d '{{\"name\": \"ada\", \"loud\": true}}' http://127.0.0.1:8088/hooks/greet");

    while !activation.is_complete() {
        std::thread::sleep(std::time::Duration::from_millis(100));
    }

    println!("State: {}", activation.state());
    for (key, value) in activation.results().iter() {
        println!("{} = {}", key, value);
    }
    engine.deactivate(&chain.id).unwrap();
    engine.shutdown();
}
