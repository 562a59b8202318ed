// Subset of the ERC-20 interface the widget reads and writes.

alloy::sol! {
    interface IERC20 {
        function balanceOf(address owner) external view returns (uint256 balance);
        function transfer(address to, uint256 amount) external returns (bool success);
    }
}
