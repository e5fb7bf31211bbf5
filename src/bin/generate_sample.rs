//! Writes a deterministic demo CSV for trying out the analyzer.
//!
//! Usage: `generate_sample [output.csv]` (defaults to `sample_data.csv`).

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }

    fn pick<'a>(&mut self, items: &[&'a str]) -> &'a str {
        items[(self.next_u64() % items.len() as u64) as usize]
    }
}

fn main() {
    let output_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "sample_data.csv".to_string());
    let mut rng = SimpleRng::new(42);

    let samples = ["Sample_A", "Sample_B", "Sample_C"];
    let concentrations = [0.1, 0.5, 1.0, 2.0, 5.0];
    let operators = ["Alice", "Bob"];

    let mut writer = csv::Writer::from_path(&output_path).expect("Failed to create output file");
    writer
        .write_record([
            "measurement_id",
            "sample",
            "operator",
            "concentration",
            "absorbance",
            "temperature",
            "passed_qc",
        ])
        .expect("Failed to write header");

    let mut row_id: i64 = 0;
    for sample in &samples {
        for &conc in &concentrations {
            for _ in 0..4 {
                let operator = rng.pick(&operators);
                let absorbance = 0.35 * conc + rng.gauss(0.0, 0.02 + 0.01 * conc);
                // roughly one reading in twelve is missing
                let absorbance = if rng.next_f64() < 0.08 {
                    String::new()
                } else {
                    format!("{absorbance:.4}")
                };
                let temperature = rng.gauss(21.5, 0.8);
                let passed_qc = if rng.next_f64() < 0.9 { "True" } else { "False" };

                writer
                    .write_record([
                        row_id.to_string(),
                        sample.to_string(),
                        operator.to_string(),
                        conc.to_string(),
                        absorbance,
                        format!("{temperature:.2}"),
                        passed_qc.to_string(),
                    ])
                    .expect("Failed to write row");
                row_id += 1;
            }
        }
    }
    writer.flush().expect("Failed to flush output");

    println!("Wrote {row_id} measurements to {output_path}");
}
