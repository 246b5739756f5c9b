//! # RTIC-based Firmware Entry Point
//!
//! A hardware-task-driven alternative to the Embassy executor: the HI-tier
//! step-pulse ISR binds directly to a hardware timer interrupt rather than
//! a cooperative task, which is what production boards should ship with --
//! `dda_stepper::DdaEngine::on_hi_tier_tick` is written to run to
//! completion in well under one tick period, but only a real interrupt
//! guarantees it runs on time regardless of what else the executor is doing.

#![allow(unused_imports)]

#[rtic::app(device = stm32f4xx_hal::pac, dispatchers = [EXTI0, EXTI1, EXTI2, EXTI3])]
mod app {
    use core::cell::RefCell;
    use critical_section::Mutex;
    use dda_stepper::{AtomicGpioPort, Timer as DdaTimer};
    use mc_proto::commands::{Command, Message};
    use mc_proto::parser::Parser;
    use rtic_monotonics::{systick::*, Monotonic};
    use stm32f4xx_hal::{
        gpio::{gpiod, Output, PushPull},
        pac::{GPIOB, GPIOE, TIM2, USART1},
        prelude::*,
        serial::{Config as SerialConfig, Event as SerialEvent, Rx, Serial, Tx},
        timer::{CounterUs, Event as TimerEvent},
    };

    use mc_firmware::{safety, stepper};

    type LedPin = gpiod::PD12<Output<PushPull>>;

    /// A GPIO port driven through its BSRR (bit-set/reset) register:
    /// `set_and_clear_atomic` issues one write that both sets and clears
    /// bits in the same register access, which is what makes it safe to
    /// call from the HI-tier ISR without a critical section of its own.
    struct BsrrPort {
        block: *const stm32f4xx_hal::pac::gpioa::RegisterBlock,
    }

    // SAFETY: each `BsrrPort` instance owns exclusive access to one port's
    // register block for the lifetime of the firmware; the RTIC framework
    // guarantees `stepper_isr` cannot run reentrantly.
    unsafe impl Send for BsrrPort {}

    impl AtomicGpioPort for BsrrPort {
        fn set_and_clear_atomic(&mut self, set_mask: u8, clear_mask: u8) {
            let bits = (set_mask as u32) | ((clear_mask as u32) << 16);
            unsafe { (*self.block).bsrr.write(|w| w.bits(bits)) };
        }

        fn write(&mut self, mask: u8) {
            let set = mask as u32;
            let clear = (!mask as u32) & 0xff;
            unsafe { (*self.block).bsrr.write(|w| w.bits(set | (clear << 16))) };
        }
    }

    struct StepperTimerProxy {
        tim: CounterUs<TIM2>,
    }

    impl DdaTimer for StepperTimerProxy {
        fn schedule_next(&mut self, ticks: u16) {
            let _ = self.tim.start((ticks as u32).micros());
        }
        fn trigger_now(&mut self) {
            let _ = self.tim.start(1.micros());
        }
        fn stop(&mut self) {
            let _ = self.tim.cancel();
        }
    }

    #[shared]
    struct Shared {
        usart_tx: Tx<USART1>,
    }

    #[local]
    struct Local {
        led: LedPin,
        step_port: Mutex<RefCell<BsrrPort>>,
        dir_port: Mutex<RefCell<BsrrPort>>,
        stepper_timer: Mutex<RefCell<StepperTimerProxy>>,
        usart_rx: Rx<USART1>,
        parser: Parser,
        rx_buf: heapless::Vec<u8, 256>,
        seq: u8,
    }

    #[init]
    fn init(cx: init::Context) -> (Shared, Local) {
        defmt::info!("RTIC Init");
        let dp = cx.device;

        let rcc = dp.RCC.constrain();
        let clocks = rcc.cfgr.use_hse(8.MHz()).sysclk(168.MHz()).freeze();

        let systick_mono_token = rtic_monotonics::create_systick_token!();
        Systick::start(cx.core.SYST, clocks.hclk().0, systick_mono_token);

        let gpiod = dp.GPIOD.split();
        let mut led = gpiod.pd12.into_push_pull_output();
        led.set_high();

        let gpioa = dp.GPIOA.split();
        let tx_pin = gpioa.pa9.into_alternate();
        let rx_pin = gpioa.pa10.into_alternate();
        let serial_config = SerialConfig::default().baudrate(250_000.bps());
        let (usart_tx, mut usart_rx) = Serial::new(dp.USART1, (tx_pin, rx_pin), serial_config, &clocks)
            .unwrap()
            .split();
        usart_rx.listen(SerialEvent::Rxne);

        let mut stepper_timer = dp.TIM2.counter_us(&clocks);
        stepper_timer.listen(TimerEvent::Update);

        let step_port = Mutex::new(RefCell::new(BsrrPort { block: GPIOE::ptr() as *const _ }));
        let dir_port = Mutex::new(RefCell::new(BsrrPort { block: GPIOB::ptr() as *const _ }));
        let stepper_timer_proxy = Mutex::new(RefCell::new(StepperTimerProxy { tim: stepper_timer }));

        supervisor_task::spawn().ok();

        defmt::info!("RTIC Init complete.");

        (
            Shared { usart_tx },
            Local {
                led,
                step_port,
                dir_port,
                stepper_timer: stepper_timer_proxy,
                usart_rx,
                parser: Parser::new(),
                rx_buf: heapless::Vec::new(),
                seq: 0,
            },
        )
    }

    #[idle(local = [led])]
    fn idle(cx: idle::Context) -> ! {
        loop {
            cx.local.led.toggle();
            Systick::delay(500.millis()).unwrap();
        }
    }

    /// The HI tier: runs every step-pulse period at the highest priority in
    /// the system. The critical path is entirely inside
    /// `stepper::on_hi_tier_tick`; this binding only owns clearing the
    /// timer's interrupt flag.
    #[task(binds = TIM2, local = [step_port, dir_port, stepper_timer], priority = 4)]
    fn stepper_isr(cx: stepper_isr::Context) {
        critical_section::with(|cs| {
            cx.local.stepper_timer.borrow(cs).borrow_mut().tim.clear_interrupt(TimerEvent::Update);
        });
        stepper::on_hi_tier_tick(cx.local.step_port, cx.local.dir_port, cx.local.stepper_timer);
    }

    /// Communication task: reads bytes off the USART as they arrive and
    /// feeds them to the shared `mc_proto` parser. This is the LO tier's
    /// entry point -- `QueueMove` commands land in `stepper::load_segment`.
    #[task(binds = USART1, local = [usart_rx, parser, rx_buf, seq], priority = 2)]
    fn usart_task(cx: usart_task::Context) {
        let Ok(byte) = cx.local.usart_rx.read() else { return };
        if cx.local.rx_buf.push(byte).is_err() {
            cx.local.rx_buf.clear();
            return;
        }

        match cx.local.parser.parse(cx.local.rx_buf) {
            Ok(Some((Message::Command(Command::QueueMove(queue_move)), consumed))) => {
                let is_new_block = !stepper::is_running() && !stepper::has_prep_pending();
                if stepper::load_segment(&queue_move, is_new_block) {
                    stepper::start_if_idle();
                }
                cx.local.rx_buf.rotate_left(consumed);
                cx.local.rx_buf.truncate(cx.local.rx_buf.len() - consumed);
            }
            Ok(Some((Message::Command(Command::Feedhold), consumed))) => {
                safety::open_interlock();
                cx.local.rx_buf.rotate_left(consumed);
                cx.local.rx_buf.truncate(cx.local.rx_buf.len() - consumed);
            }
            Ok(Some((Message::Command(Command::CycleStart), consumed))) => {
                safety::close_interlock();
                cx.local.rx_buf.rotate_left(consumed);
                cx.local.rx_buf.truncate(cx.local.rx_buf.len() - consumed);
            }
            Ok(Some((_, consumed))) => {
                cx.local.rx_buf.rotate_left(consumed);
                cx.local.rx_buf.truncate(cx.local.rx_buf.len() - consumed);
            }
            Ok(None) => {}
            Err((_, consumed)) => {
                cx.local.rx_buf.rotate_left(consumed);
                cx.local.rx_buf.truncate(cx.local.rx_buf.len() - consumed);
            }
        }
    }

    /// Periodic, low-priority: advances the safety manager's millisecond
    /// clock so an interlock opened through it (rather than through a
    /// direct `safety::trip_estop`) also stops the HI tier.
    #[task(priority = 1)]
    async fn supervisor_task(_: supervisor_task::Context) {
        loop {
            safety::tick(Systick::now().duration_since_epoch().to_millis() as u32);
            Systick::delay(100.millis()).await;
        }
    }
}
