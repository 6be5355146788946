use num_complex::Complex64 as C64;
use rand::{ Rng, distributions::Distribution, thread_rng };
use statrs::distribution::Normal;
use tracing_subscriber::EnvFilter;
use mps_factor::{ mps::MPS, verify };

const N: usize = 4; // number of sites
const D: usize = 2; // physical dimension

/// (∣0...0⟩ + ∣(d-1)...(d-1)⟩) / √2
fn ghz_state(n: usize, d: usize) -> Vec<C64> {
    let len = d.pow(n as u32);
    let mut state = vec![C64::from(0.0); len];
    state[0] += C64::from(0.5_f64.sqrt());
    state[len - 1] += C64::from(0.5_f64.sqrt());
    state
}

/// Normalized state with real and imaginary parts of every amplitude drawn
/// from a standard normal distribution.
fn random_state<R>(n: usize, d: usize, rng: &mut R) -> Vec<C64>
where R: Rng + ?Sized
{
    let normal = Normal::new(0.0, 1.0).unwrap();
    let state: Vec<C64> =
        (0..d.pow(n as u32))
        .map(|_| C64::new(normal.sample(rng), normal.sample(rng)))
        .collect();
    let norm: f64 = state.iter().map(|a| a.norm_sqr()).sum::<f64>().sqrt();
    state.into_iter().map(|a| a / norm).collect()
}

fn run<R>(label: &str, state: Vec<C64>, rng: &mut R)
where R: Rng + ?Sized
{
    println!("== {label} ==");
    let mps: MPS<C64> = MPS::from_vector(N, D, state.clone()).unwrap();
    for (k, g) in mps.sites().iter().enumerate() {
        println!("A[{k}]: {:?}", g.dims());
    }
    println!("bond dimensions: {:?}", mps.bond_dims());

    let zeros = vec![0; N];
    let ones = vec![D - 1; N];
    let path: Vec<usize> = (0..N).map(|_| rng.gen_range(0..D)).collect();
    println!("{zeros:?} -> {:+.5}", mps.amplitude(&zeros).unwrap());
    println!("{ones:?} -> {:+.5}", mps.amplitude(&ones).unwrap());
    println!("{path:?} -> {:+.5}", mps.amplitude(&path).unwrap());

    let report = verify::verify_exhaustive(&mps, &state, None).unwrap();
    println!(
        "checked {} amplitudes: max error {:.2e} at {:?} ({})",
        report.checked,
        report.max_err,
        report.worst,
        if report.passed { "ok" } else { "FAILED" },
    );
    println!("left-canonical: {}", verify::is_left_canonical(&mps, None));
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut rng = thread_rng();
    run("GHZ", ghz_state(N, D), &mut rng);
    run("random", random_state(N, D, &mut rng), &mut rng);
}
