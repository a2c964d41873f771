//! Button input for the punch meter.
//!
//! `ButtonState` lives in a static shared between the GPIO interrupt and the
//! main loop, protected with `critical_section`. `handle_button_generic`
//! debounces falling edges and runs `on_press` inside the interrupt.

use core::cell::{Cell, RefCell};
use critical_section::Mutex;

use esp_hal::gpio::Input;

pub struct ButtonState<'a> {
    pub input: Mutex<RefCell<Option<Input<'a>>>>,
    pub last_level: Mutex<Cell<bool>>,
    pub last_interrupt: Mutex<Cell<u64>>,
    pub name: &'static str,
}

impl<'a> ButtonState<'a> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            input: Mutex::new(RefCell::new(None)),
            last_level: Mutex::new(Cell::new(true)),
            last_interrupt: Mutex::new(Cell::new(0)),
            name,
        }
    }

    /// Hand the pin to the shared state; call once before enabling interrupts.
    pub fn install(&self, input: Input<'a>) {
        critical_section::with(|cs| {
            self.input.borrow_ref_mut(cs).replace(input);
            self.last_level.borrow(cs).set(true);
        });
    }
}

// Handle button press events
pub fn handle_button_generic(btn: &ButtonState, now_ms: u64, debounce_ms: u64, on_press: impl Fn()) {
    critical_section::with(|cs| {
        let mut btn_binding = btn.input.borrow_ref_mut(cs);
        let Some(input) = btn_binding.as_mut() else {
            return;
        };

        // Check if interrupt is actually pending
        if !input.is_interrupt_set() {
            return;
        }
        input.clear_interrupt();

        let level_is_low = input.is_low();
        let last_high = btn.last_level.borrow(cs).get();
        btn.last_level.borrow(cs).set(!level_is_low);

        if last_high && level_is_low {
            // Falling edge detected
            let last_debounce = btn.last_interrupt.borrow(cs).get();
            if now_ms.saturating_sub(last_debounce) > debounce_ms {
                btn.last_interrupt.borrow(cs).set(now_ms);
                on_press();
            }
        }
    });
}
