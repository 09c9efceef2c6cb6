use ahash::AHashSet;
use clap::{Args, Subcommand};
use owo_colors::OwoColorize;

use crate::{api::models::User as Account, cli::Context, error::CliError};

#[derive(Debug, Subcommand)]
pub enum User {
    /// Show who a user follows and is followed by, and who does not follow back
    Lists(Lists),
}

impl User {
    pub async fn run(self, ctx: &Context) -> Result<(), CliError> {
        match self {
            Self::Lists(cmd) => cmd.run(ctx).await,
        }
    }
}

#[derive(Debug, Args)]
pub struct Lists {
    #[clap(value_parser, value_name = "USERNAME")]
    username: String,
}

impl Lists {
    pub async fn run(self, ctx: &Context) -> Result<(), CliError> {
        let lists = ctx.client()?.lists_for_user(&self.username).await?;

        print_list("Followers:", &lists.followers);
        print_list("Following:", &lists.following);

        for user in not_mutual(&lists.following, &lists.followers) {
            println!("{} {}", "Not mutual:".bold().yellow(), user.username);
        }

        Ok(())
    }
}

fn print_list(title: &str, users: &[Account]) {
    let names: Vec<&str> = users.iter().map(|user| user.username.as_str()).collect();
    println!(
        "{} {} {:?}",
        title.bold().blue(),
        names.len().to_string().bold(),
        names
    );
}

/// Followed users that do not follow back, in `following` order.
fn not_mutual<'a>(following: &'a [Account], followers: &[Account]) -> Vec<&'a Account> {
    let followers: AHashSet<&str> = followers.iter().map(|user| user.username.as_str()).collect();

    following
        .iter()
        .filter(|user| !followers.contains(user.username.as_str()))
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    fn account(id: u64, username: &str) -> Account {
        Account {
            id,
            username: username.to_string(),
        }
    }

    #[test]
    fn users_that_do_not_follow_back() {
        let following = [account(1, "ann"), account(2, "bob"), account(3, "cid")];
        let followers = [account(2, "bob"), account(9, "zed")];

        let names: Vec<&str> = not_mutual(&following, &followers)
            .into_iter()
            .map(|user| user.username.as_str())
            .collect();
        assert_eq!(names, ["ann", "cid"]);
    }
}
