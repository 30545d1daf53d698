// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! rosbridge command-line client.
//!
//! # Usage
//!
//! ```bash
//! # Print every message on /chatter
//! rosbridgectl echo /chatter std_msgs/String
//!
//! # Publish at 2 Hz
//! rosbridgectl pub /chatter std_msgs/String '{"data":"hello"}' --rate 2
//!
//! # Call a service and wait up to 5 s
//! rosbridgectl call /add_two_ints rospy_tutorials/AddTwoInts '{"a":1,"b":2}' --timeout 5
//!
//! # Against a remote bridge described in a file
//! rosbridgectl --config robot.toml echo /odom nav_msgs/Odometry -n 1
//! ```

use clap::{Parser, Subcommand};
use rosbridge::{
    Compression, ConfigError, Ros, RosConfig, Scheme, Service, Topic, TopicOptions,
};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Subscriber handle used by `echo`.
const ECHO_HANDLE: &str = "rosbridgectl";

/// rosbridge client
#[derive(Parser, Debug)]
#[command(name = "rosbridgectl")]
#[command(about = "rosbridge client - echo topics, publish messages, call services")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Bridge hostname (overrides the config file)
    #[arg(long, global = true)]
    host: Option<String>,

    /// Bridge port (overrides the config file)
    #[arg(long, global = true)]
    port: Option<u16>,

    /// Use wss://
    #[arg(long, global = true)]
    tls: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print messages published on a topic
    Echo {
        topic: String,

        #[arg(value_name = "TYPE")]
        type_name: String,

        /// Exit after this many messages
        #[arg(short = 'n', long)]
        count: Option<usize>,

        /// Minimum interval between messages, enforced by the bridge (ms)
        #[arg(long, default_value = "0")]
        throttle_rate: u32,

        /// Ask the bridge for png-compressed messages
        #[arg(long)]
        png: bool,
    },

    /// Publish a JSON message on a topic
    Pub {
        topic: String,

        #[arg(value_name = "TYPE")]
        type_name: String,

        /// Message payload as JSON
        json: String,

        /// Publish rate (Hz)
        #[arg(long, default_value = "1.0")]
        rate: f64,

        /// Publish a single message and exit
        #[arg(long)]
        once: bool,
    },

    /// Call a service and print its response
    Call {
        service: String,

        #[arg(value_name = "TYPE")]
        type_name: String,

        /// Request payload as JSON
        json: Option<String>,

        /// Seconds to wait for the response
        #[arg(long, default_value = "10")]
        timeout: u64,
    },

    /// Generate a default configuration file
    GenConfig {
        /// Output file path
        #[arg(short, long, default_value = "rosbridge.toml")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Commands::GenConfig { output } = &args.command {
        return cmd_gen_config(output);
    }

    let config = build_config(&args)?;
    let ros = Ros::new(config);
    ros.connect().await?;

    let outcome = match args.command {
        Commands::Echo {
            topic,
            type_name,
            count,
            throttle_rate,
            png,
        } => cmd_echo(&ros, topic, type_name, count, throttle_rate, png).await,
        Commands::Pub {
            topic,
            type_name,
            json,
            rate,
            once,
        } => cmd_pub(&ros, topic, type_name, &json, rate, once).await,
        Commands::Call {
            service,
            type_name,
            json,
            timeout,
        } => cmd_call(&ros, service, type_name, json.as_deref(), timeout).await,
        Commands::GenConfig { .. } => Ok(()),
    };

    ros.disconnect().await;
    outcome
}

fn build_config(args: &Args) -> Result<RosConfig, ConfigError> {
    let mut config = match args.config {
        Some(ref path) => RosConfig::from_file(path)?,
        None => RosConfig::default(),
    };

    if let Some(ref host) = args.host {
        config.hostname.clone_from(host);
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if args.tls {
        config.scheme = Scheme::Wss;
    }

    config.validate()?;
    Ok(config)
}

async fn cmd_echo(
    ros: &Ros,
    topic: String,
    type_name: String,
    count: Option<usize>,
    throttle_rate: u32,
    png: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let compression = if png {
        Compression::Png
    } else {
        Compression::None
    };
    let options = TopicOptions::default()
        .compression(compression)
        .throttle_rate(throttle_rate);
    let topic = Topic::<Value>::with_options(ros, topic, type_name, options);

    let (tx, mut rx) = mpsc::unbounded_channel();
    topic
        .subscribe(ECHO_HANDLE, move |msg: &Value, _id| {
            let _ = tx.send(msg.to_string());
        })
        .await?;
    info!("Echoing '{}'", topic.name());

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut received = 0usize;
    loop {
        tokio::select! {
            line = rx.recv() => {
                let Some(line) = line else { break };
                println!("{}", line);
                received += 1;
                if count.is_some_and(|limit| received >= limit) {
                    break;
                }
            }
            _ = &mut ctrl_c => break,
        }
    }

    topic.unsubscribe(ECHO_HANDLE).await?;
    Ok(())
}

async fn cmd_pub(
    ros: &Ros,
    topic: String,
    type_name: String,
    json: &str,
    rate: f64,
    once: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let message: Value = serde_json::from_str(json)?;
    let topic = Topic::<Value>::new(ros, topic, type_name);

    if once {
        topic.publish(&message).await?;
        topic.unadvertise().await?;
        return Ok(());
    }

    let period = publish_period(rate)?;
    let mut interval = tokio::time::interval(period);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut published = 0u64;
    loop {
        tokio::select! {
            _ = interval.tick() => {
                topic.publish(&message).await?;
                published += 1;
            }
            _ = &mut ctrl_c => break,
        }
    }

    info!("Published {} messages on '{}'", published, topic.name());
    topic.unadvertise().await?;
    Ok(())
}

fn publish_period(rate: f64) -> Result<Duration, ConfigError> {
    if !rate.is_finite() || rate <= 0.0 {
        return Err(ConfigError::Invalid(format!(
            "rate must be a positive number of Hz, got {}",
            rate
        )));
    }
    Ok(Duration::from_secs_f64(1.0 / rate))
}

async fn cmd_call(
    ros: &Ros,
    service: String,
    type_name: String,
    json: Option<&str>,
    timeout: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    let request: Value = serde_json::from_str(json.unwrap_or("{}"))?;
    let service = Service::<Value, Value>::new(ros, service, type_name);

    let reply = service
        .call_and_wait(&request, Some(Duration::from_secs(timeout)))
        .await?;

    println!("result: {}", reply.result);
    match reply.values {
        Some(values) => println!("{}", serde_json::to_string_pretty(&values)?),
        None => println!("(no values)"),
    }

    if reply.result {
        Ok(())
    } else {
        let id = reply.id.unwrap_or_default();
        Err(format!("service '{}' reported failure for call '{}'", service.name(), id).into())
    }
}

fn cmd_gen_config(output: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let toml_str = toml::to_string_pretty(&RosConfig::default())?;

    let content = format!(
        r#"# rosbridge client configuration
# Generated by rosbridgectl gen-config

{}"#,
        toml_str
    );

    std::fs::write(output, content)?;
    println!("Generated configuration file: {}", output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_echo() {
        let args = Args::try_parse_from([
            "rosbridgectl",
            "--host",
            "robot",
            "echo",
            "/chatter",
            "std_msgs/String",
            "-n",
            "3",
            "--png",
        ])
        .expect("parse");
        assert_eq!(args.host.as_deref(), Some("robot"));
        match args.command {
            Commands::Echo {
                topic,
                type_name,
                count,
                throttle_rate,
                png,
            } => {
                assert_eq!(topic, "/chatter");
                assert_eq!(type_name, "std_msgs/String");
                assert_eq!(count, Some(3));
                assert_eq!(throttle_rate, 0);
                assert!(png);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_build_config_overrides_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("bridge.toml");
        std::fs::write(&path, "hostname = \"robot\"\nport = 9191\n").expect("write");

        let args = Args::try_parse_from([
            "rosbridgectl",
            "--config",
            path.to_str().expect("utf8 path"),
            "--port",
            "9292",
            "--tls",
            "call",
            "/add",
            "rospy_tutorials/AddTwoInts",
        ])
        .expect("parse");
        let config = build_config(&args).expect("config");
        assert_eq!(config.url(), "wss://robot:9292");
    }

    #[test]
    fn test_gen_config_round_trips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("rosbridge.toml");
        cmd_gen_config(&path).expect("gen-config");
        let config = RosConfig::from_file(&path).expect("load");
        assert_eq!(config, RosConfig::default());
    }

    #[test]
    fn test_publish_period() {
        assert_eq!(
            publish_period(4.0).expect("period"),
            Duration::from_millis(250)
        );
        assert!(publish_period(0.0).is_err());
        assert!(publish_period(f64::NAN).is_err());
    }
}
