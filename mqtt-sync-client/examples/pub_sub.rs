#[macro_use]
extern crate log;

use std::process;
use std::time::Duration;

use anyhow::{anyhow, Result};
use structopt::StructOpt;
use url::Url;

use mqtt_sync_client::{
    mqtt::{ClientId, PublishFlags, QoS},
    Connector,
};

#[derive(StructOpt, Debug)]
#[structopt(
    name = "pub_sub",
    about = "an MQTT version 3.1.1 client which subscribes, publishes and unsubscribes once"
)]
struct Opt {
    /// Specify the host to connect to.
    #[structopt(short, long, default_value = "localhost")]
    host: String,

    /// Connect to the port specified.
    #[structopt(short, long, default_value = "1883")]
    port: u16,

    /// Specify user, password, hostname and port at once as a URL.
    /// The URL must be in the form: mqtt://[username[:password]@]host[:port]
    #[structopt(short = "L", long)]
    url: Option<Url>,

    /// The id to use for this client, only [0-9a-zA-Z] are allowed.
    #[structopt(short, long)]
    id: Option<String>,

    /// Provide a prefix that the client id will be built from by appending the process id of the client.
    #[structopt(short = "I", long, default_value = "pubsub")]
    id_prefix: String,

    /// Use a random client id of the given length.
    #[structopt(long)]
    random_id: Option<usize>,

    /// The number of seconds between sending PING commands to the broker.
    #[structopt(short, long, default_value = "60")]
    keep_alive: u16,

    /// Ask the broker to resume the stored session.
    #[structopt(short = "c", long)]
    no_clean_session: bool,

    /// The topic on which to send a Will, in the event that the client disconnects unexpectedly.
    #[structopt(long)]
    will_topic: Option<String>,

    /// Specify a message that will be stored by the broker and sent out if this client disconnects unexpectedly.
    #[structopt(long)]
    will_payload: Option<String>,

    /// The QoS to use for the Will.
    #[structopt(long, default_value = "at-most-once", parse(try_from_str = parse_qos))]
    will_qos: QoS,

    /// If given, the Will will be treated as a retained message.
    #[structopt(long)]
    will_retain: bool,

    /// Provide a username to be used for authenticating with the broker.
    #[structopt(short, long)]
    username: Option<String>,

    /// Provide a password to be used for authenticating with the broker.
    #[structopt(short = "P", long)]
    password: Option<String>,

    /// How many seconds to wait for every acknowledgment.
    #[structopt(long, default_value = "10")]
    timeout: u64,

    /// The MQTT topic to subscribe and publish to.
    #[structopt(short, long, required = true)]
    topic: Vec<String>,

    /// Specify the quality of service of the subscriptions and the messages.
    #[structopt(short, long, default_value = "at-most-once", parse(try_from_str = parse_qos))]
    qos: QoS,

    /// The message published to every topic.
    #[structopt(short, long, default_value = "hello")]
    message: String,

    /// Retain the published messages.
    #[structopt(short, long)]
    retain: bool,
}

fn parse_qos(s: &str) -> Result<QoS> {
    match s {
        "0" | "at-most-once" => Ok(QoS::AtMostOnce),
        "1" | "at-least-once" => Ok(QoS::AtLeastOnce),
        "2" | "exactly-once" => Ok(QoS::ExactlyOnce),
        _ => Err(anyhow!("invalid QoS: {}", s)),
    }
}

impl Opt {
    fn server(&self) -> Result<(&str, u16)> {
        if let Some(ref url) = self.url {
            let host = url.host_str().ok_or_else(|| anyhow!("missing hostname"))?;
            let port = url
                .port()
                .or_else(|| match url.scheme() {
                    "mqtt" => Some(1883),
                    _ => None,
                })
                .ok_or_else(|| anyhow!("unexpected scheme"))?;

            Ok((host, port))
        } else {
            Ok((self.host.as_str(), self.port))
        }
    }

    fn credentials(&self) -> (Option<&str>, Option<&str>) {
        match self.url {
            Some(ref url) if !url.username().is_empty() => (Some(url.username()), url.password()),
            _ => (self.username.as_deref(), self.password.as_deref()),
        }
    }

    fn client_id(&self) -> Result<ClientId> {
        if let Some(size) = self.random_id {
            Ok(ClientId::random(size))
        } else if let Some(ref id) = self.id {
            Ok(ClientId::new(id.as_str())?)
        } else {
            Ok(ClientId::new(format!("{}{}", self.id_prefix, process::id()))?)
        }
    }

    fn publish_flags(&self) -> PublishFlags {
        let mut flags = PublishFlags::from(self.qos);
        if self.retain {
            flags |= PublishFlags::RETAIN;
        }
        flags
    }
}

fn main() -> Result<()> {
    pretty_env_logger::init();

    let opt = Opt::from_args();
    debug!("{:#?}", opt);

    let (host, port) = opt.server()?;
    let client_id = opt.client_id()?;
    let mut connector = Connector::new(host, port, &client_id);

    connector
        .with_keep_alive(opt.keep_alive)
        .with_response_timeout(Duration::from_secs(opt.timeout));

    if opt.no_clean_session {
        connector.without_clean_session();
    }

    let (username, password) = opt.credentials();
    if let Some(username) = username {
        connector.with_username(username);
    }
    if let Some(password) = password {
        connector.with_password(password.as_bytes());
    }

    if let (Some(topic_name), Some(payload)) = (opt.will_topic.as_ref(), opt.will_payload.as_ref())
    {
        connector.with_last_will(
            topic_name,
            payload.as_bytes(),
            opt.will_qos,
            opt.will_retain,
        );
    }

    let mut session = connector.connect()?;

    let subscribe_ack = session.subscribe(opt.topic.iter().map(|s| (s.as_str(), opt.qos)))?;

    for (topic_name, qos) in opt.topic.iter().zip(subscribe_ack.granted()) {
        info!("{} subscribed as `{}`", topic_name, qos);
    }

    for topic_name in &opt.topic {
        session.publish(topic_name, opt.message.as_bytes(), opt.publish_flags())?;

        info!("published {} bytes to {}", opt.message.len(), topic_name);
    }

    session.unsubscribe(opt.topic.iter().map(|s| s.as_str()))?;

    info!("{} topics unsubscribed", opt.topic.len());

    session.disconnect()?;

    Ok(())
}
