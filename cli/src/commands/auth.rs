use anyhow::anyhow;
use clap::Args;
use secrecy::SecretString;
use tollgate_api::ApiClient;

/// Login credentials, taken from flags, the environment or a prompt
#[derive(Args, Debug, Clone, PartialEq)]
pub struct Credentials {
    /// Account email
    #[arg(long, env = "TOLLGATE_EMAIL")]
    pub email: Option<String>,

    /// Account password (prompted for when omitted)
    #[arg(long, env = "TOLLGATE_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct ForgotPasswordArgs {
    /// Account email
    #[arg(long, env = "TOLLGATE_EMAIL")]
    pub email: String,
}

impl Credentials {
    pub fn is_present(&self) -> bool {
        self.email.is_some()
    }

    fn resolve(self) -> anyhow::Result<(String, SecretString)> {
        let email = self
            .email
            .filter(|email| !email.trim().is_empty())
            .ok_or_else(|| anyhow!("an email is required, pass --email or set TOLLGATE_EMAIL"))?;

        let password = match self.password {
            Some(password) => password,
            None => rpassword::prompt_password(format!("Password for {email}: "))
                .map_err(|e| anyhow!("failed to read password: {e}"))?,
        };

        Ok((email, SecretString::from(password)))
    }
}

/// Log `client` in. The session lives only as long as the client.
pub async fn sign_in(client: &ApiClient, credentials: Credentials) -> anyhow::Result<String> {
    let (email, password) = credentials.resolve()?;
    client.login(&email, &password).await?;
    Ok(email)
}

pub async fn login(client: &ApiClient, credentials: Credentials) -> anyhow::Result<()> {
    let email = sign_in(client, credentials).await?;
    println!("Logged in as {email}");
    Ok(())
}

pub async fn forgot_password(client: &ApiClient, args: ForgotPasswordArgs) -> anyhow::Result<()> {
    client.forgot_password(&args.email).await?;
    println!("If {} has an account, a reset email is on its way.", args.email);
    Ok(())
}
