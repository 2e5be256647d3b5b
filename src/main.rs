use std::io;

use rukh::Engine;

fn main() -> anyhow::Result<()> {
    rukh::print_engine_info();
    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut out = io::stdout();
    Engine::new(&mut input, &mut out).uci_loop()
}
