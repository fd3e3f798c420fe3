use dotenvy::dotenv;

// (name, fallback used when neither .env nor the environment provides it)
const BUILD_ENV: &[(&str, &str)] = &[
  ("API_BASE_URL", "http://localhost:8000"),
  ("FIREBASE_API_KEY", ""),
  ("FIREBASE_AUTH_DOMAIN", ""),
  ("FIREBASE_PROJECT_ID", ""),
  ("FIREBASE_STORAGE_BUCKET", ""),
  ("FIREBASE_MESSAGING_SENDER_ID", ""),
  ("FIREBASE_APP_ID", ""),
  ("AUTOSAVE_DEBOUNCE_MS", "1500"),
];

fn main() {
  // Tell Cargo that if the env file changes, to rerun this build script.
  println!("cargo::rerun-if-changed=.env");

  if dotenv().is_err() {
    println!("cargo::warning=no .env file found, using process environment and defaults");
  }

  for (name, fallback) in BUILD_ENV {
    println!("cargo::rerun-if-env-changed={}", name);
    match std::env::var(name) {
      Ok(value) => println!("cargo::rustc-env={}={}", name, value),
      Err(_) => {
        if !fallback.is_empty() {
          println!("cargo::warning={} not set, defaulting to {}", name, fallback);
        }
        println!("cargo::rustc-env={}={}", name, fallback);
      }
    }
  }
}
