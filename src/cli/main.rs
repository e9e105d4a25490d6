//! Interactive shell over the client library. Path semantics are
//! client-side only: a relative path is resolved against a
//! locally-tracked "current DFS directory"; only the resulting absolute
//! path is ever sent to the coordinator, which canonicalizes it for real.

use std::path::PathBuf;

use rustyline::error::ReadlineError;
use rustyline::Editor;
use structopt::StructOpt;

use dfs_client::DfsClient;
use dfs_util::config::{read_config, ClientConfig};
use dfs_util::error::Error;

#[derive(StructOpt, Debug)]
#[structopt(name = "dfs-cli")]
struct Opt {
	/// Configuration file
	#[structopt(short = "c", long = "config", default_value = "./client.toml")]
	config_file: PathBuf,
}

struct Shell {
	client: DfsClient,
	user: Option<String>,
	cwd: String,
}

impl Shell {
	fn resolve(&self, path: &str) -> String {
		if path.starts_with('/') {
			path.to_string()
		} else if self.cwd == "/" {
			format!("/{}", path)
		} else {
			format!("{}/{}", self.cwd, path)
		}
	}

	fn require_user(&self) -> Result<&str, Error> {
		self.user
			.as_deref()
			.ok_or_else(|| Error::NotLoggedIn("no active session".into()))
	}

	async fn dispatch(&mut self, line: &str) -> Result<bool, Error> {
		let parts: Vec<&str> = line.split_whitespace().collect();
		let cmd = match parts.first() {
			Some(c) => *c,
			None => return Ok(true),
		};

		match cmd {
			"login" => {
				let username = parts.get(1).ok_or_else(|| Error::InvalidArgument("usage: login <username>".into()))?;
				self.client.login(username).await?;
				self.user = Some(username.to_string());
				self.cwd = "/".to_string();
				println!("logged in as {}", username);
			}
			"logout" => {
				let username = self.require_user()?.to_string();
				self.client.logout(&username).await?;
				self.user = None;
				println!("logged out");
			}
			"whoami" => match &self.user {
				Some(u) => println!("{}", u),
				None => println!("(not logged in)"),
			},
			"ls" => {
				let username = self.require_user()?.to_string();
				let path = self.resolve(parts.get(1).copied().unwrap_or("."));
				for entry in self.client.ls(&username, &path).await? {
					println!("{}", entry);
				}
			}
			"cd" => {
				self.require_user()?;
				let path = self.resolve(parts.get(1).copied().unwrap_or("/"));
				self.cwd = path;
			}
			"mkdir" => {
				let username = self.require_user()?.to_string();
				let path = self.resolve(parts.get(1).ok_or_else(|| Error::InvalidArgument("usage: mkdir <path>".into()))?);
				self.client.mkdir(&username, &path).await?;
			}
			"rmdir" => {
				let username = self.require_user()?.to_string();
				let path = self.resolve(parts.get(1).ok_or_else(|| Error::InvalidArgument("usage: rmdir <path>".into()))?);
				self.client.rmdir(&username, &path).await?;
			}
			"rm" => {
				let username = self.require_user()?.to_string();
				let path = self.resolve(parts.get(1).ok_or_else(|| Error::InvalidArgument("usage: rm <path>".into()))?);
				self.client.rm(&username, &path).await?;
			}
			"mv" => {
				let username = self.require_user()?.to_string();
				let src = self.resolve(parts.get(1).ok_or_else(|| Error::InvalidArgument("usage: mv <src> <dst>".into()))?);
				let dst = self.resolve(parts.get(2).ok_or_else(|| Error::InvalidArgument("usage: mv <src> <dst>".into()))?);
				let final_path = self.client.mv(&username, &src, &dst).await?;
				println!("moved to {}", final_path);
			}
			"put" => {
				let username = self.require_user()?.to_string();
				let local = PathBuf::from(parts.get(1).ok_or_else(|| Error::InvalidArgument("usage: put <local> <dfs_path>".into()))?);
				let dfs_path = self.resolve(parts.get(2).ok_or_else(|| Error::InvalidArgument("usage: put <local> <dfs_path>".into()))?);
				self.client.put(&username, &local, &dfs_path).await?;
				println!("put {} -> {}", local.display(), dfs_path);
			}
			"get" => {
				let username = self.require_user()?.to_string();
				let dfs_path = self.resolve(parts.get(1).ok_or_else(|| Error::InvalidArgument("usage: get <dfs_path> <local>".into()))?);
				let local = PathBuf::from(parts.get(2).ok_or_else(|| Error::InvalidArgument("usage: get <dfs_path> <local>".into()))?);
				self.client.get(&username, &dfs_path, &local).await?;
				println!("get {} -> {}", dfs_path, local.display());
			}
			"exit" | "quit" => return Ok(false),
			other => println!("unknown command: {}", other),
		}
		Ok(true)
	}
}

#[tokio::main]
async fn main() {
	tracing_subscriber::fmt::Subscriber::builder()
		.with_env_filter(tracing_subscriber::filter::EnvFilter::from_default_env())
		.init();

	let opt = Opt::from_args();
	if let Err(e) = run(opt.config_file).await {
		eprintln!("dfs-cli: {}", e);
		std::process::exit(1);
	}
}

async fn run(config_file: PathBuf) -> Result<(), Error> {
	let config: ClientConfig = read_config(config_file)?;

	let client = DfsClient::connect(
		&config.rpc_secret,
		config.rpc_bind_addr,
		config.coordinator_addr,
		&config.coordinator_id,
		config.block_size as u64,
	)
	.await?;

	let mut shell = Shell {
		client,
		user: None,
		cwd: "/".to_string(),
	};

	let mut rl = Editor::<()>::new().map_err(|e| Error::Message(e.to_string()))?;
	loop {
		let prompt = format!("{}:{}> ", shell.user.as_deref().unwrap_or("(anon)"), shell.cwd);
		match rl.readline(&prompt) {
			Ok(line) => {
				let line = line.trim();
				if line.is_empty() {
					continue;
				}
				rl.add_history_entry(line);
				match shell.dispatch(line).await {
					Ok(true) => {}
					Ok(false) => break,
					Err(e) => println!("error: {}", e),
				}
			}
			Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
			Err(e) => {
				eprintln!("readline error: {}", e);
				break;
			}
		}
	}

	Ok(())
}
